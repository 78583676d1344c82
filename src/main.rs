use anyhow::{Context, Result};
use pulseboard::cache::{run_cache_sweeper, ResponseCache};
use pulseboard::config::{load_config, PulseboardConfig};
use pulseboard::credentials::CredentialStore;
use pulseboard::oauth::{create_oauth_router, run_state_cleanup, OAuthAppState, StateManager};
use pulseboard::token::TokenLifecycleManager;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulseboard=info".into()),
        )
        .init();

    info!("Pulseboard starting...");

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

    // Response cache with its background sweep task
    let cache = Arc::new(ResponseCache::with_default_ttl(chrono::Duration::seconds(
        config.cache.ttl_seconds,
    )));
    tokio::spawn(run_cache_sweeper(
        Arc::clone(&cache),
        config.cache.sweep_interval_seconds,
    ));

    // Ephemeral OAuth state store with its cleanup task
    let state_manager = StateManager::new(config.token.state_expiry_seconds);
    tokio::spawn(run_state_cleanup(state_manager.clone(), 60));

    let token_manager = Arc::new(TokenLifecycleManager::with_skew_seconds(
        Arc::clone(&credential_store),
        Arc::clone(&cache),
        config.token.skew_seconds,
    ));

    let oauth_state = OAuthAppState {
        credential_store,
        token_manager,
        state_manager,
        auth_enabled: config.server.auth_enabled,
        callback_base_url: config.server.callback_base_url.clone(),
    };

    let app = create_oauth_router(oauth_state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(addr = %config.server.bind_addr, "Pulseboard listening");

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
