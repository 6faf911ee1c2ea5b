//! Command-line interface parsing for the burn ban API
//!
//! This module handles parsing of CLI arguments using clap. Every option can
//! also be set through an environment variable, which is how the service is
//! configured when deployed.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use thiserror::Error;

use crate::data::burn_bans::MFC_BASE_URL;

/// Cache directory used when no platform cache directory can be determined
const FALLBACK_CACHE_DIR: &str = ".cache";

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The bind host is not an IP address
    #[error("Invalid host: '{0}'. Expected an IP address such as 0.0.0.0 or 127.0.0.1")]
    InvalidHost(String),

    /// A zero TTL would make every cached entry stale on arrival
    #[error("Invalid TTL: 0 hours. Use --no-expiry to cache without expiration")]
    ZeroTtl,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Burn ban API - Serve Mississippi burn ban status over HTTP
#[derive(Parser, Debug)]
#[command(name = "burnban")]
#[command(about = "Serve Mississippi burn ban status over HTTP with an on-disk cache")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BURNBAN_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding cache files (defaults to the platform cache directory)
    #[arg(long, env = "BURNBAN_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// How long fetched burn ban data stays fresh
    #[arg(long, env = "BURNBAN_TTL_HOURS", value_name = "HOURS", default_value_t = 8)]
    pub ttl_hours: u64,

    /// Cache burn ban data without expiration
    #[arg(long)]
    pub no_expiry: bool,

    /// Origin of the burn ban source
    #[arg(long, env = "BURNBAN_UPSTREAM_URL", value_name = "URL", default_value = MFC_BASE_URL)]
    pub upstream_url: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated service configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub cache_dir: PathBuf,
    /// `None` caches without expiration
    pub time_to_live: Option<Duration>,
    pub upstream_url: String,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Creates a ServiceConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServiceConfig)` with defaults filled in
    /// * `Err(CliError)` if the host or TTL is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let host: IpAddr = cli
            .host
            .parse()
            .map_err(|_| CliError::InvalidHost(cli.host.clone()))?;

        let time_to_live = match (cli.no_expiry, cli.ttl_hours) {
            (true, _) => None,
            (false, 0) => return Err(CliError::ZeroTtl),
            (false, hours) => Some(Duration::from_secs(hours.saturating_mul(3600))),
        };

        Ok(ServiceConfig {
            bind_addr: SocketAddr::new(host, cli.port),
            cache_dir: cli.cache_dir.clone().unwrap_or_else(default_cache_dir),
            time_to_live,
            upstream_url: cli.upstream_url.clone(),
            log_format: cli.log_format,
        })
    }
}

/// Platform cache directory for burnban (`~/.cache/burnban/` on Linux)
///
/// Falls back to `./.cache` when no home directory is available.
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "burnban")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_explicit_args() {
        let cli = Cli::parse_from([
            "burnban",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--cache-dir",
            "/tmp/burnban",
            "--ttl-hours",
            "2",
        ]);

        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/burnban")));
        assert_eq!(cli.ttl_hours, 2);
        assert!(!cli.no_expiry);
    }

    #[test]
    fn test_config_from_cli() {
        let cli = Cli::parse_from([
            "burnban",
            "--host",
            "127.0.0.1",
            "-p",
            "8080",
            "--cache-dir",
            "/tmp/burnban",
            "--ttl-hours",
            "8",
            "--upstream-url",
            "http://localhost:9000",
        ]);
        let config = ServiceConfig::from_cli(&cli).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/burnban"));
        assert_eq!(config.time_to_live, Some(Duration::from_secs(8 * 3600)));
        assert_eq!(config.upstream_url, "http://localhost:9000");
    }

    #[test]
    fn test_config_no_expiry_overrides_ttl() {
        let cli = Cli::parse_from([
            "burnban",
            "--host",
            "0.0.0.0",
            "--no-expiry",
            "--ttl-hours",
            "0",
        ]);
        let config = ServiceConfig::from_cli(&cli).unwrap();

        assert!(config.time_to_live.is_none());
    }

    #[test]
    fn test_config_rejects_zero_ttl() {
        let cli = Cli::parse_from(["burnban", "--host", "0.0.0.0", "--ttl-hours", "0"]);
        let result = ServiceConfig::from_cli(&cli);

        assert!(matches!(result, Err(CliError::ZeroTtl)));
    }

    #[test]
    fn test_config_rejects_invalid_host() {
        let cli = Cli::parse_from(["burnban", "--host", "not-a-host"]);
        let err = ServiceConfig::from_cli(&cli).unwrap_err();

        assert!(err.to_string().contains("Invalid host"));
        assert!(err.to_string().contains("not-a-host"));
    }

    #[test]
    fn test_config_default_cache_dir() {
        let cli = Cli::parse_from(["burnban", "--host", "0.0.0.0", "--ttl-hours", "1"]);
        if cli.cache_dir.is_none() {
            let config = ServiceConfig::from_cli(&cli).unwrap();
            assert_eq!(config.cache_dir, default_cache_dir());
        }
        // Skipped when BURNBAN_CACHE_DIR is set in the environment
    }

    #[test]
    fn test_default_cache_dir_names_project() {
        let path = default_cache_dir();
        let path_str = path.to_string_lossy();
        assert!(
            path_str.contains("burnban") || path_str == FALLBACK_CACHE_DIR,
            "Cache path should contain project name"
        );
    }

    #[test]
    fn test_log_format_parses() {
        let cli = Cli::parse_from(["burnban", "--log-format", "json"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
