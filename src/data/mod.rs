//! Burn ban data model and upstream client
//!
//! Records are fetched from the Mississippi Forestry Commission burn ban table
//! and normalized before being cached and served.

pub mod burn_bans;

pub use burn_bans::{parse_central_date, BurnBanClient, BurnBanError};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exemption codes this service expands to labels
///
/// A cell holding only one of these codes is rewritten to its label before
/// caching. The labels are this service's wording.
pub const EXEMPTION_CODES: &[(u32, &str)] = &[
    (0, "No exemptions"),
    (1, "Certified prescribed burn managers"),
    (2, "Agricultural burning"),
    (3, "Certified prescribed burn managers and agricultural burning"),
];

/// A single county's burn ban status
///
/// Field names match the upstream table columns and the JSON served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnBan {
    /// County name, e.g. "Hinds"
    pub counties: String,
    /// When the ban was issued, ISO-8601 UTC if the upstream date parsed
    pub issued: String,
    /// When the ban ends, ISO-8601 UTC if the upstream date parsed
    pub expires: String,
    /// Exemption description
    pub exemptions: String,
}

impl BurnBan {
    /// Case-insensitive comparison against the county name
    pub fn matches_county(&self, county: &str) -> bool {
        self.counties.to_lowercase() == county.to_lowercase()
    }
}

/// Finds the first record for `county`, ignoring case
pub fn find_county<'a>(burn_bans: &'a [BurnBan], county: &str) -> Option<&'a BurnBan> {
    burn_bans.iter().find(|ban| ban.matches_county(county))
}

/// Errors building an exemption table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExemptionError {
    #[error("Duplicate exemption code: {0}")]
    DuplicateCode(u32),
}

/// Fixed mapping from numeric exemption code to label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptionTable {
    labels: BTreeMap<u32, &'static str>,
}

impl ExemptionTable {
    /// Builds a table, rejecting codes that appear more than once
    pub fn new(entries: &[(u32, &'static str)]) -> Result<Self, ExemptionError> {
        let mut labels = BTreeMap::new();
        for &(code, label) in entries {
            if labels.insert(code, label).is_some() {
                return Err(ExemptionError::DuplicateCode(code));
            }
        }
        Ok(Self { labels })
    }

    pub fn label(&self, code: u32) -> Option<&'static str> {
        self.labels.get(&code).copied()
    }

    /// Replaces a bare numeric code with its label; other text is kept as-is
    pub fn normalize(&self, raw: &str) -> String {
        raw.trim()
            .parse::<u32>()
            .ok()
            .and_then(|code| self.label(code))
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string())
    }
}

impl Default for ExemptionTable {
    fn default() -> Self {
        Self {
            labels: EXEMPTION_CODES.iter().copied().collect(),
        }
    }
}
