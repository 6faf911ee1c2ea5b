//! Mississippi Forestry Commission burn ban client
//!
//! The burn ban page embeds a Ninja Tables widget. Fetching its rows takes two
//! requests: the public page, to scrape the table's nonce, and the WordPress
//! AJAX endpoint, which returns every row as `[{ "value": { ... } }]`.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{BurnBan, ExemptionTable};

/// Origin of the Mississippi Forestry Commission site
pub const MFC_BASE_URL: &str = "https://www.mfc.ms.gov";

/// Public page embedding the burn ban table
const NONCE_PATH: &str = "/burning-info/burn-bans/";

/// WordPress AJAX endpoint serving table rows
const TABLE_DATA_PATH: &str = "/wp-admin/admin-ajax.php";

/// Ninja Tables id of the burn ban table
const BURN_BAN_TABLE_ID: &str = "1775";

static NONCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ninja_table_public_nonce=([a-z0-9]+)").expect("NONCE_REGEX pattern is valid")
});

/// Upstream dates are Central Standard Time, UTC-6, year round
const CST_OFFSET_SECS: i32 = 6 * 3600;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `%Y` also accepts a two-digit year, so parses below this are discarded and
/// the `%y` layouts get their turn
const MIN_FOUR_DIGIT_YEAR: i32 = 1000;

/// Date-and-time layouts seen in the table, tried before date-only layouts
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%B %d, %Y",
    "%A, %B %d, %Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

/// Errors that can occur when fetching burn ban data
#[derive(Debug, Error)]
pub enum BurnBanError {
    /// HTTP request or response decoding failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The burn ban page came back empty
    #[error("Failed to fetch nonce: empty burn ban page")]
    EmptyNoncePage,

    /// The burn ban page did not contain a table nonce
    #[error("Failed to parse nonce from burn ban page")]
    NonceNotFound,

    /// The table endpoint answered with a non-success status
    #[error("Failed to fetch burn ban data: upstream returned {0}")]
    UpstreamStatus(StatusCode),
}

/// A row as returned by the table endpoint
#[derive(Debug, Deserialize)]
struct TableRow {
    value: BurnBan,
}

/// Client for the burn ban table
#[derive(Debug, Clone)]
pub struct BurnBanClient {
    http_client: Client,
    base_url: String,
    exemptions: ExemptionTable,
}

impl Default for BurnBanClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BurnBanClient {
    /// Creates a client for the live MFC site
    pub fn new() -> Self {
        Self::with_base_url(MFC_BASE_URL)
    }

    /// Creates a client against another origin (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = match Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to build HTTP client, using defaults without timeout");
                Client::new()
            }
        };
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            exemptions: ExemptionTable::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scrapes the table nonce from the public burn ban page
    ///
    /// # Errors
    /// * `BurnBanError::Http` if the page cannot be fetched
    /// * `BurnBanError::EmptyNoncePage` if the page body is empty
    /// * `BurnBanError::NonceNotFound` if no nonce appears in the page
    pub async fn fetch_nonce(&self) -> Result<String, BurnBanError> {
        let url = format!("{}{}", self.base_url, NONCE_PATH);
        debug!(url = %url, "Fetching burn ban table nonce");

        let body = self.http_client.get(&url).send().await?.text().await?;
        if body.trim().is_empty() {
            return Err(BurnBanError::EmptyNoncePage);
        }

        extract_nonce(&body).ok_or(BurnBanError::NonceNotFound)
    }

    /// Fetches and normalizes every burn ban record
    ///
    /// Dates are converted from Central time to ISO-8601 UTC where they parse,
    /// and numeric exemption codes are replaced by their labels.
    pub async fn fetch_burn_bans(&self) -> Result<Vec<BurnBan>, BurnBanError> {
        let nonce = self.fetch_nonce().await?;
        let url = format!("{}{}", self.base_url, TABLE_DATA_PATH);
        debug!(url = %url, "Fetching burn ban table rows");

        let response = self
            .http_client
            .post(&url)
            .query(&[
                ("action", "wp_ajax_ninja_tables_public_action"),
                ("table_id", BURN_BAN_TABLE_ID),
                ("target_action", "get-all-data"),
                ("default_sorting", "new_first"),
                ("skip_rows", "0"),
                ("limit_rows", "0"),
                ("ninja_table_public_nonce", nonce.as_str()),
            ])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BurnBanError::UpstreamStatus(response.status()));
        }

        let rows: Vec<TableRow> = response.json().await?;
        let burn_bans: Vec<BurnBan> = rows
            .into_iter()
            .map(|row| self.normalize(row.value))
            .collect();

        info!(count = burn_bans.len(), "Fetched burn ban data");
        Ok(burn_bans)
    }

    fn normalize(&self, row: BurnBan) -> BurnBan {
        BurnBan {
            issued: parse_central_date(&row.issued),
            expires: parse_central_date(&row.expires),
            exemptions: self.exemptions.normalize(&row.exemptions),
            counties: row.counties,
        }
    }
}

/// Pulls the Ninja Tables public nonce out of an HTML page
fn extract_nonce(body: &str) -> Option<String> {
    NONCE_REGEX
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|nonce| nonce.as_str().to_string())
}

/// Converts a Central Standard Time date to an ISO-8601 UTC timestamp
///
/// Date-only values are taken as midnight CST. Text that does not parse is
/// returned unchanged.
pub fn parse_central_date(text: &str) -> String {
    let trimmed = text.trim();
    parse_naive(trimmed)
        .and_then(|naive| {
            FixedOffset::west_opt(CST_OFFSET_SECS)?
                .from_local_datetime(&naive)
                .single()
        })
        .map(|local| {
            local
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .unwrap_or_else(|| text.to_string())
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .filter(|datetime| datetime.year() >= MIN_FOUR_DIGIT_YEAR)
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .filter(|date| date.year() >= MIN_FOUR_DIGIT_YEAR)
                })
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
