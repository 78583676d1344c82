//! Periodic sync scheduler.
//!
//! Walks every connected (user, provider) pair on a fixed interval and runs
//! one sync cycle per pair. Pairs whose provider is not registered are
//! skipped with a warning; auth failures are logged and left for the status
//! endpoint to surface. Cycles never retry internally — the next tick is the
//! retry.

use crate::registry::find_provider;
use crate::{MetricsProvider, SyncEngine, SyncOutcome};
use pulseboard::credentials::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default interval between sync cycles: one hour.
pub const DEFAULT_SYNC_INTERVAL_SECONDS: u64 = 3600;

/// Runs one sync cycle over every connected pair. Returns the number of
/// pairs whose sync reported `Completed` or `PartialFailure`.
pub async fn run_sync_cycle(
    engine: &SyncEngine,
    credential_store: &CredentialStore,
    providers: &[Arc<dyn MetricsProvider>],
) -> usize {
    let pairs = match credential_store.list_all() {
        Ok(pairs) => pairs,
        Err(e) => {
            error!(error = %e, "Failed to list connected accounts");
            return 0;
        }
    };

    if pairs.is_empty() {
        info!("No connected accounts, nothing to sync");
        return 0;
    }

    info!(pairs = pairs.len(), "Starting scheduled sync cycle");

    let mut synced = 0usize;
    for (user_id, provider_name) in pairs {
        let provider = match find_provider(providers, &provider_name) {
            Some(provider) => provider,
            None => {
                warn!(
                    user_id = %user_id,
                    provider = %provider_name,
                    "No registered provider for connected account, skipping"
                );
                continue;
            }
        };

        // One sync in flight per pair: pairs run sequentially within a cycle
        match engine.sync_provider(&user_id, provider.as_ref()).await {
            SyncOutcome::Completed { .. } | SyncOutcome::PartialFailure { .. } => synced += 1,
            SyncOutcome::Failed { .. } => {}
        }
    }

    info!(synced = synced, "Scheduled sync cycle finished");
    synced
}

/// Background task: run a sync cycle every `interval_seconds`.
pub async fn run_sync_scheduler(
    engine: Arc<SyncEngine>,
    credential_store: Arc<CredentialStore>,
    providers: Vec<Arc<dyn MetricsProvider>>,
    interval_seconds: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
    info!(
        interval_seconds = interval_seconds,
        "Sync scheduler started"
    );

    loop {
        interval.tick().await;
        run_sync_cycle(&engine, &credential_store, &providers).await;
    }
}
