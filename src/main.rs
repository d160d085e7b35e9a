use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use signal_vault::api::SignalApiClient;
use signal_vault::config::Config;
use signal_vault::relay::SignalRelay;
use signal_vault::storage::FileStorage;
use signal_vault::store::SignalStore;
use signal_vault::transport::{RealtimeClient, WsConnector};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("Failed to create data dir {}", cfg.data_dir))?;
    let storage = FileStorage::new(&cfg.data_dir).with_quota(cfg.storage_quota_bytes);
    info!("Data dir: {}", storage.dir().display());

    let store = SignalStore::open(Box::new(storage), cfg.store_config()).shared();
    let feed = Arc::new(SignalApiClient::new(&cfg.api_url, cfg.auth_token()));
    let client = RealtimeClient::new(
        cfg.realtime_config(),
        Arc::new(WsConnector),
        Arc::clone(&store),
        cfg.auth_token(),
    );

    let mut relay = SignalRelay::new(cfg.shared(), store, client, feed);
    relay.run().await?;

    Ok(())
}
