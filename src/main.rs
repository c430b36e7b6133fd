//! Venue Ledger server
//!
//! Reads `~/.config/venue-ledger/config.toml` (or `VENUE_LEDGER_CONFIG`)
//! and serves the REST API until SIGINT / SIGTERM.

use tracing::{error, info};

use venue_ledger::{init_tracing, resolve_config_path, AppConfig, ServerHandle, ServerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = resolve_config_path(None);
    let config = match AppConfig::load(&config_path) {
        Ok(config) => {
            init_tracing(&config);
            info!(path = %config_path.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            let config = AppConfig::default();
            init_tracing(&config);
            error!(error = %e, "Failed to load config, using defaults");
            config
        }
    };

    let handle = ServerHandle::start(ServerOptions {
        config,
        ..Default::default()
    })
    .await?;
    handle.install_signal_handler();
    handle.run_until_shutdown().await;
    Ok(())
}
