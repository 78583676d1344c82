use anyhow::{Context, Result};
use pulseboard::cache::ResponseCache;
use pulseboard::config::{load_config, PulseboardConfig};
use pulseboard::credentials::CredentialStore;
use pulseboard::token::TokenLifecycleManager;
use std::sync::Arc;
use sync_engine::registry::all_providers;
use sync_engine::scheduler::run_sync_scheduler;
use sync_engine::{SnapshotStore, SyncEngine};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_engine=info,pulseboard=info".into()),
        )
        .init();

    info!("Sync engine starting...");

    let config = match std::env::var("PULSEBOARD_CONFIG") {
        Ok(path) => load_config(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?,
        Err(_) => PulseboardConfig::default(),
    };

    let encryption_key = std::env::var("PULSEBOARD_ENCRYPTION_KEY")
        .context("PULSEBOARD_ENCRYPTION_KEY must be set (base64-encoded 32-byte key)")?;

    let credential_store = Arc::new(
        CredentialStore::new(&config.server.credentials_db_path, &encryption_key)
            .context("Failed to open credential store")?,
    );

    let snapshot_store = Arc::new(
        SnapshotStore::new(&config.sync.snapshots_db_path)
            .context("Failed to open snapshot store")?,
    );

    let cache = Arc::new(ResponseCache::with_default_ttl(chrono::Duration::seconds(
        config.cache.ttl_seconds,
    )));

    let token_manager = Arc::new(TokenLifecycleManager::with_skew_seconds(
        Arc::clone(&credential_store),
        cache,
        config.token.skew_seconds,
    ));

    let engine = Arc::new(SyncEngine::with_window_days(
        token_manager,
        snapshot_store,
        config.sync.window_days,
    ));

    info!(
        window_days = config.sync.window_days,
        interval_seconds = config.sync.interval_seconds,
        "Sync engine configured"
    );

    run_sync_scheduler(
        engine,
        credential_store,
        all_providers(),
        config.sync.interval_seconds,
    )
    .await;

    Ok(())
}
