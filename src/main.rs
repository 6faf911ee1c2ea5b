//! Burn Ban API - Serve Mississippi burn ban status over HTTP
//!
//! Fetches burn ban records from the Mississippi Forestry Commission, caches
//! them on disk, and serves them as JSON.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use burnban::cache::{MemoizeOptions, Memoized};
use burnban::cli::{Cli, LogFormat, ServiceConfig};
use burnban::data::BurnBanClient;
use burnban::server::{self, ServerState, SharedState, BURN_BANS_CACHE_KEY};

/// Sets up tracing output, honouring `RUST_LOG` on top of the crate default
fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("burnban=info".parse()?)
        .add_directive("tower_http=info".parse()?);

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServiceConfig::from_cli(&cli)?;

    init_tracing(config.log_format)?;

    info!("Starting burn ban API...");
    info!("Cache dir: {:?}", config.cache_dir);
    match config.time_to_live {
        Some(ttl) => info!("Cache TTL: {} seconds", ttl.as_secs()),
        None => info!("Cache TTL: never expires"),
    }
    info!("Upstream: {}", config.upstream_url);

    let client = BurnBanClient::with_base_url(config.upstream_url.clone());
    let burn_bans = Memoized::new(
        config.cache_dir.clone(),
        server::client_producer(client),
        MemoizeOptions {
            cache_key: Some(BURN_BANS_CACHE_KEY.to_string()),
            time_to_live: config.time_to_live,
        },
    );

    let state: SharedState = Arc::new(ServerState::new(burn_bans));

    server::start_server(state, config.bind_addr).await?;

    info!("Burn ban API stopped");
    Ok(())
}
