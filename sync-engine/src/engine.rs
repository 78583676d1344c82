//! The sync engine: one full metrics-pull cycle per invocation.

use crate::provider::MetricsProvider;
use crate::snapshot::SnapshotStore;
use chrono::{Duration, NaiveDate, Utc};
use pulseboard::token::{TokenError, TokenLifecycleManager};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default trailing window: 30 days.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// One failed unit of sync work (a single day, or one batch range).
#[derive(Clone, Debug)]
pub struct UnitFailure {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub message: String,
}

/// Structured result of one sync cycle.
///
/// Distinguishes "provider fully unreachable" (`Failed`) from "one day was
/// malformed" (`PartialFailure`).
#[derive(Debug)]
pub enum SyncOutcome {
    /// Every unit succeeded.
    Completed { days_written: usize },
    /// Some units succeeded, some failed; the written days are durable.
    PartialFailure {
        days_written: usize,
        failures: Vec<UnitFailure>,
    },
    /// Nothing was written: no credentials, or every unit failed.
    Failed { error: String },
}

/// Orchestrates metrics pulls for connected accounts.
///
/// The engine never retries within an invocation — retry-with-backoff belongs
/// to the caller (the scheduler, or a manual trigger). Re-running a sync for
/// the same window is always safe because snapshot writes overwrite by day.
/// The window's metrics pulls are never cached: a sync means fresh data.
pub struct SyncEngine {
    token_manager: Arc<TokenLifecycleManager>,
    snapshot_store: Arc<SnapshotStore>,
    window_days: i64,
}

impl SyncEngine {
    /// Creates an engine with the default 30-day window.
    pub fn new(token_manager: Arc<TokenLifecycleManager>, snapshot_store: Arc<SnapshotStore>) -> Self {
        Self::with_window_days(token_manager, snapshot_store, DEFAULT_WINDOW_DAYS)
    }

    /// Creates an engine with a custom trailing window.
    pub fn with_window_days(
        token_manager: Arc<TokenLifecycleManager>,
        snapshot_store: Arc<SnapshotStore>,
        window_days: i64,
    ) -> Self {
        Self {
            token_manager,
            snapshot_store,
            window_days: window_days.max(1),
        }
    }

    /// Runs one full sync cycle for a (user, provider) pair.
    ///
    /// Obtains a valid token, chunks the trailing window into units sized by
    /// the provider's `batch_days`, and attempts every unit even when some
    /// fail — a single bad day must not block the other 29.
    pub async fn sync_provider(
        &self,
        user_id: &str,
        provider: &dyn MetricsProvider,
    ) -> SyncOutcome {
        let provider_name = provider.name();

        let token = match self
            .token_manager
            .ensure_valid_token(user_id, provider_name)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                // Nothing to merge without credentials; auth errors are
                // surfaced unchanged so callers can prompt a reconnect.
                warn!(
                    user_id = %user_id,
                    provider = %provider_name,
                    error = %e,
                    "Sync aborted: no valid token"
                );
                return SyncOutcome::Failed {
                    error: match e {
                        TokenError::NotAuthenticated => "not authenticated".to_string(),
                        TokenError::ReauthorizationRequired => {
                            "reauthorization required".to_string()
                        }
                        other => other.to_string(),
                    },
                };
            }
        };

        let end = Utc::now().date_naive();
        let start = end - Duration::days(self.window_days - 1);
        let batch = provider.batch_days().max(1);

        info!(
            user_id = %user_id,
            provider = %provider_name,
            start = %start,
            end = %end,
            batch_days = batch,
            "Starting sync cycle"
        );

        let mut days_written = 0usize;
        let mut units_succeeded = 0usize;
        let mut failures: Vec<UnitFailure> = Vec::new();

        let mut unit_start = start;
        while unit_start <= end {
            let unit_end = (unit_start + Duration::days(batch - 1)).min(end);

            match provider.fetch_range(&token, unit_start, unit_end).await {
                Ok(day_metrics) => {
                    let mut unit_failed = false;
                    for metrics in &day_metrics {
                        if let Err(e) =
                            self.snapshot_store.upsert(user_id, provider_name, metrics)
                        {
                            warn!(
                                user_id = %user_id,
                                provider = %provider_name,
                                day = %metrics.date,
                                error = %e,
                                "Failed to write snapshot"
                            );
                            failures.push(UnitFailure {
                                start: metrics.date,
                                end: metrics.date,
                                message: format!("snapshot write failed: {}", e),
                            });
                            unit_failed = true;
                        } else {
                            days_written += 1;
                        }
                    }
                    if !unit_failed {
                        units_succeeded += 1;
                    }
                }
                Err(e) => {
                    // Record and continue: remaining units still get their turn
                    debug!(
                        user_id = %user_id,
                        provider = %provider_name,
                        unit_start = %unit_start,
                        unit_end = %unit_end,
                        error = %e,
                        "Sync unit failed"
                    );
                    failures.push(UnitFailure {
                        start: unit_start,
                        end: unit_end,
                        message: e.to_string(),
                    });
                }
            }

            unit_start = unit_end + Duration::days(1);
        }

        let outcome = if failures.is_empty() {
            SyncOutcome::Completed { days_written }
        } else if units_succeeded == 0 && days_written == 0 {
            SyncOutcome::Failed {
                error: failures
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "all sync units failed".to_string()),
            }
        } else {
            SyncOutcome::PartialFailure {
                days_written,
                failures,
            }
        };

        match &outcome {
            SyncOutcome::Completed { days_written } => info!(
                user_id = %user_id,
                provider = %provider_name,
                days_written = days_written,
                "Sync cycle completed"
            ),
            SyncOutcome::PartialFailure {
                days_written,
                failures,
            } => warn!(
                user_id = %user_id,
                provider = %provider_name,
                days_written = days_written,
                failed_units = failures.len(),
                "Sync cycle partially failed"
            ),
            SyncOutcome::Failed { error } => warn!(
                user_id = %user_id,
                provider = %provider_name,
                error = %error,
                "Sync cycle failed"
            ),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DayMetrics;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Duration;
    use pulseboard::cache::ResponseCache;
    use pulseboard::credentials::{CredentialStore, Credentials};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider whose behavior is scripted per date range.
    struct ScriptedProvider {
        batch: i64,
        /// Dates whose unit should fail
        failing: Vec<NaiveDate>,
        calls: AtomicUsize,
        fail_all: bool,
    }

    impl ScriptedProvider {
        fn per_day(failing: Vec<NaiveDate>) -> Self {
            Self {
                batch: 1,
                failing,
                calls: AtomicUsize::new(0),
                fail_all: false,
            }
        }

        fn batched(batch: i64) -> Self {
            Self {
                batch,
                failing: vec![],
                calls: AtomicUsize::new(0),
                fail_all: false,
            }
        }

        fn always_failing() -> Self {
            Self {
                batch: 1,
                failing: vec![],
                calls: AtomicUsize::new(0),
                fail_all: true,
            }
        }
    }

    #[async_trait]
    impl MetricsProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn batch_days(&self) -> i64 {
            self.batch
        }

        async fn fetch_range(
            &self,
            _access_token: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DayMetrics>> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.fail_all {
                return Err(anyhow!("provider unreachable"));
            }
            if self.failing.iter().any(|d| *d >= start && *d <= end) {
                return Err(anyhow!("bad unit"));
            }

            let mut days = Vec::new();
            let mut date = start;
            while date <= end {
                days.push(DayMetrics {
                    date,
                    views: 100,
                    engagement: 10,
                    followers: 500,
                });
                date += Duration::days(1);
            }
            Ok(days)
        }
    }

    fn make_engine(window_days: i64) -> (SyncEngine, Arc<SnapshotStore>, Arc<CredentialStore>) {
        let key = BASE64.encode([0u8; 32]);
        let cred_store =
            Arc::new(CredentialStore::new(":memory:", &key).expect("Failed to create store"));
        let snapshot_store = Arc::new(SnapshotStore::new(":memory:").unwrap());
        let token_manager = Arc::new(TokenLifecycleManager::new(
            Arc::clone(&cred_store),
            Arc::new(ResponseCache::new()),
        ));

        let engine = SyncEngine::with_window_days(
            token_manager,
            Arc::clone(&snapshot_store),
            window_days,
        );
        (engine, snapshot_store, cred_store)
    }

    fn connect(store: &CredentialStore, user: &str) {
        store
            .upsert(
                user,
                "scripted",
                &Credentials {
                    access_token: "tok".to_string(),
                    refresh_token: Some("r".to_string()),
                    expires_at: Some(Utc::now() + Duration::hours(1)),
                    token_type: None,
                    scope: None,
                },
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_sync_without_credentials_fails() {
        let (engine, _, _) = make_engine(30);
        let provider = ScriptedProvider::per_day(vec![]);

        let outcome = engine.sync_provider("nobody", &provider).await;
        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        // No token means no provider calls at all
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_per_day_sync_completes() {
        let (engine, snapshots, creds) = make_engine(30);
        connect(&creds, "u1");

        let provider = ScriptedProvider::per_day(vec![]);
        let outcome = engine.sync_provider("u1", &provider).await;

        match outcome {
            SyncOutcome::Completed { days_written } => assert_eq!(days_written, 30),
            other => panic!("expected Completed, got {:?}", other),
        }
        // Per-day provider: one call per day in the window
        assert_eq!(provider.calls.load(Ordering::SeqCst), 30);

        let end = Utc::now().date_naive();
        let start = end - Duration::days(29);
        let rows = snapshots.get_range("u1", "scripted", start, end).unwrap();
        assert_eq!(rows.len(), 30);
    }

    #[tokio::test]
    async fn test_batched_provider_issues_fewer_calls() {
        let (engine, _, creds) = make_engine(30);
        connect(&creds, "u1");

        let provider = ScriptedProvider::batched(30);
        let outcome = engine.sync_provider("u1", &provider).await;

        assert!(matches!(
            outcome,
            SyncOutcome::Completed { days_written: 30 }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_bad_day_is_contained() {
        let (engine, snapshots, creds) = make_engine(30);
        connect(&creds, "u1");

        // Day 15 of the window fails, all others succeed
        let end = Utc::now().date_naive();
        let start = end - Duration::days(29);
        let bad_day = start + Duration::days(14);

        let provider = ScriptedProvider::per_day(vec![bad_day]);
        let outcome = engine.sync_provider("u1", &provider).await;

        match outcome {
            SyncOutcome::PartialFailure {
                days_written,
                failures,
            } => {
                assert_eq!(days_written, 29);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].start, bad_day);
            }
            other => panic!("expected PartialFailure, got {:?}", other),
        }

        // The 29 good days are present; the bad day is absent
        let rows = snapshots.get_range("u1", "scripted", start, end).unwrap();
        assert_eq!(rows.len(), 29);
        assert!(!rows.iter().any(|r| r.day == bad_day));
    }

    #[tokio::test]
    async fn test_all_units_failing_is_failed() {
        let (engine, _, creds) = make_engine(5);
        connect(&creds, "u1");

        let provider = ScriptedProvider::always_failing();
        let outcome = engine.sync_provider("u1", &provider).await;

        match outcome {
            SyncOutcome::Failed { error } => assert!(error.contains("unreachable")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let (engine, snapshots, creds) = make_engine(7);
        connect(&creds, "u1");

        let provider = ScriptedProvider::per_day(vec![]);

        let first = engine.sync_provider("u1", &provider).await;
        assert!(matches!(first, SyncOutcome::Completed { days_written: 7 }));

        let end = Utc::now().date_naive();
        let start = end - Duration::days(6);
        let rows_after_first = snapshots.get_range("u1", "scripted", start, end).unwrap();

        let second = engine.sync_provider("u1", &provider).await;
        assert!(matches!(second, SyncOutcome::Completed { days_written: 7 }));

        // Same rows, same values — no duplicates from the second pass
        let rows_after_second = snapshots.get_range("u1", "scripted", start, end).unwrap();
        assert_eq!(rows_after_first, rows_after_second);
        assert_eq!(rows_after_second.len(), 7);
    }
}
