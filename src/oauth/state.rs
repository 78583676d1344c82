//! Ephemeral OAuth state store bridging the redirect to its callback.
//!
//! Holds the one-time CSRF state issued at `/oauth/start` until the provider
//! redirects back to `/oauth/callback`. Entries are single-use (deleted on
//! read), expire after a few minutes, and are swept periodically. This store
//! is deliberately separate from the response cache: its semantics are
//! delete-on-read, not read-through.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Pending authorization tracked between redirect and callback.
#[derive(Clone, Debug)]
pub struct PendingAuth {
    pub provider: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Single-use OAuth state store with automatic expiration.
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, PendingAuth>>>,
    expiry_duration: Duration,
}

impl StateManager {
    /// Create a state manager. `expiry_seconds` is how long a pending
    /// authorization stays valid (default in config: 600 = 10 minutes).
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    /// Issue a new state token (UUID v4) for a pending authorization.
    pub fn create_state(&self, provider: &str, user_id: &str) -> String {
        let state = Uuid::new_v4().to_string();
        let entry = PendingAuth {
            provider: provider.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        self.states.lock().unwrap().insert(state.clone(), entry);
        state
    }

    /// Validate and consume a state token.
    ///
    /// The state is removed from the map whether or not it is still valid —
    /// a state can never be redeemed twice.
    pub fn validate_and_consume(&self, state: &str) -> Option<PendingAuth> {
        let mut states = self.states.lock().unwrap();

        let entry = states.remove(state)?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry)
    }

    /// Drop all expired pending authorizations.
    pub fn cleanup_expired(&self) {
        let mut states = self.states.lock().unwrap();
        let now = Utc::now();

        states.retain(|_, entry| now - entry.created_at <= self.expiry_duration);
    }

    /// Number of pending authorizations (monitoring helper).
    pub fn count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

/// Background task that periodically drops expired pending authorizations.
pub async fn run_state_cleanup(manager: StateManager, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        manager.cleanup_expired();
        tracing::debug!(
            pending = manager.count(),
            "OAuth state cleanup complete"
        );
    }
}
