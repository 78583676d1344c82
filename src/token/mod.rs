//! Token lifecycle management.
//!
//! Guarantees a currently-valid access token for a (user, provider) pair,
//! refreshing through the provider's token endpoint when the stored token is
//! expired or about to expire, and persisting the result. This is the only
//! component that writes to the credential store after the initial
//! authorization-code exchange.
//!
//! # Failure semantics
//!
//! - [`TokenError::NotAuthenticated`] / [`TokenError::ReauthorizationRequired`]
//!   are terminal for the stored credential: the user must (re-)run the
//!   authorization flow. Never retried automatically.
//! - [`TokenError::TransientRefreshFailure`] and [`TokenError::Persistence`]
//!   are retryable by the caller with backoff; the stored credential is left
//!   untouched so a later attempt can succeed.

use crate::cache::ResponseCache;
use crate::credentials::{CredentialStore, Credentials};
use crate::oauth::get_provider_config;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Seconds subtracted from a token's expiry when deciding "refresh now".
///
/// Avoids racing an in-flight provider request against imminent expiry.
pub const DEFAULT_SKEW_SECONDS: i64 = 60;

/// Refresh request timeout. Token endpoints answer fast or not at all.
const REFRESH_TIMEOUT_SECS: u64 = 10;

/// Typed failure taxonomy for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No credential on file; the user must start the authorization flow.
    #[error("not authenticated: no credential on file")]
    NotAuthenticated,

    /// A credential exists but cannot be renewed (refresh token revoked or
    /// absent at expiry). The stale record has been deleted; subsequent
    /// checks report `NotAuthenticated`.
    #[error("reauthorization required: credential cannot be renewed")]
    ReauthorizationRequired,

    /// Network/provider outage during refresh. The stored credential is
    /// untouched; safe to retry.
    #[error("transient refresh failure: {0}")]
    TransientRefreshFailure(String),

    /// Storage-layer failure on read or write. Safe to retry; no partial
    /// state is assumed committed.
    #[error("credential storage failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Token response from an OAuth refresh endpoint.
#[derive(Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Manages credential validity for all (user, provider) pairs.
///
/// Safe to share across concurrent requests (`Arc<TokenLifecycleManager>`).
/// Concurrent refreshes for the same pair both complete; the store's per-key
/// atomic upsert plus the read-then-merge just before each write make the
/// outcome last-successful-refresh-wins without ever dropping a rotated
/// refresh token.
pub struct TokenLifecycleManager {
    store: Arc<CredentialStore>,
    cache: Arc<ResponseCache>,
    http_client: reqwest::Client,
    skew: Duration,
    /// Overrides provider config lookup (for testing with a mock server).
    token_url_override: Option<String>,
}

impl TokenLifecycleManager {
    /// Creates a manager with the default 60-second skew buffer.
    pub fn new(store: Arc<CredentialStore>, cache: Arc<ResponseCache>) -> Self {
        Self::with_skew_seconds(store, cache, DEFAULT_SKEW_SECONDS)
    }

    /// Creates a manager with a custom skew buffer.
    pub fn with_skew_seconds(
        store: Arc<CredentialStore>,
        cache: Arc<ResponseCache>,
        skew_seconds: i64,
    ) -> Self {
        Self {
            store,
            cache,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REFRESH_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            skew: Duration::seconds(skew_seconds),
            token_url_override: None,
        }
    }

    /// Creates a manager whose refresh calls go to a fixed token URL
    /// (for testing with a mock server).
    pub fn with_token_url(
        store: Arc<CredentialStore>,
        cache: Arc<ResponseCache>,
        token_url: String,
    ) -> Self {
        let mut manager = Self::new(store, cache);
        manager.token_url_override = Some(token_url);
        manager
    }

    /// Returns a currently-valid access token for the pair, refreshing and
    /// persisting if the stored one is within the skew buffer of expiry.
    pub async fn ensure_valid_token(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<String, TokenError> {
        let credentials = self
            .store
            .get(user_id, provider)
            .map_err(TokenError::Persistence)?
            .ok_or(TokenError::NotAuthenticated)?;

        // No expiry recorded: assume long-lived, never proactively refresh.
        let expires_at = match credentials.expires_at {
            None => return Ok(credentials.access_token),
            Some(at) => at,
        };

        if Utc::now() < expires_at - self.skew {
            return Ok(credentials.access_token);
        }

        let refresh_token = match &credentials.refresh_token {
            Some(token) => token.clone(),
            None => {
                // Terminal: expired with nothing to renew it. Delete the stale
                // record so subsequent checks report NotAuthenticated.
                warn!(
                    user_id = %user_id,
                    provider = %provider,
                    "Credential expired with no refresh token, deleting"
                );
                self.store
                    .delete(user_id, provider)
                    .map_err(TokenError::Persistence)?;
                return Err(TokenError::ReauthorizationRequired);
            }
        };

        self.refresh(user_id, provider, &refresh_token).await
    }

    /// Non-throwing probe: does this pair currently hold a usable credential?
    ///
    /// Any failure — including transient ones — reads as `false`; used by
    /// "am I connected" checks that must never surface an error.
    pub async fn has_valid_credential(&self, user_id: &str, provider: &str) -> bool {
        self.ensure_valid_token(user_id, provider).await.is_ok()
    }

    /// Deletes the credential and invalidates cache entries scoped to the
    /// pair. Idempotent.
    pub fn revoke(&self, user_id: &str, provider: &str) -> Result<(), TokenError> {
        let removed = self
            .store
            .delete(user_id, provider)
            .map_err(TokenError::Persistence)?;
        self.cache.invalidate_scope(user_id, provider);

        info!(
            user_id = %user_id,
            provider = %provider,
            removed = removed,
            "Credential revoked"
        );
        Ok(())
    }

    /// Calls the provider's refresh endpoint and persists the merged result.
    async fn refresh(
        &self,
        user_id: &str,
        provider: &str,
        refresh_token: &str,
    ) -> Result<String, TokenError> {
        let (token_url, client_id, client_secret) = self.resolve_endpoint(provider)?;

        let mut form: HashMap<String, String> = HashMap::new();
        form.insert("grant_type".to_string(), "refresh_token".to_string());
        form.insert("refresh_token".to_string(), refresh_token.to_string());
        if let Some(id) = client_id {
            form.insert("client_id".to_string(), id);
        }
        if let Some(secret) = client_secret {
            form.insert("client_secret".to_string(), secret);
        }

        info!(user_id = %user_id, provider = %provider, "Refreshing access token");

        let response = self
            .http_client
            .post(&token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and connection errors are never credential-invalidating
                TokenError::TransientRefreshFailure(format!("refresh request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());

            // Only a provider-reported invalid_grant invalidates the stored
            // credential. Every other failure leaves it untouched for retry.
            if status.is_client_error() && body.contains("invalid_grant") {
                warn!(
                    user_id = %user_id,
                    provider = %provider,
                    status = %status,
                    "Refresh token rejected (invalid_grant), deleting credential"
                );
                self.store
                    .delete(user_id, provider)
                    .map_err(TokenError::Persistence)?;
                return Err(TokenError::ReauthorizationRequired);
            }

            return Err(TokenError::TransientRefreshFailure(format!(
                "refresh endpoint returned {}: {}",
                status, body
            )));
        }

        let refreshed: TokenRefreshResponse = response.json().await.map_err(|e| {
            TokenError::TransientRefreshFailure(format!("failed to parse refresh response: {}", e))
        })?;

        // Read-then-merge immediately before the write: a concurrent refresh
        // may have rotated the refresh token since our initial load, and a
        // deleted record must not be resurrected.
        let current = self
            .store
            .get(user_id, provider)
            .map_err(TokenError::Persistence)?
            .ok_or(TokenError::NotAuthenticated)?;

        let merged = Credentials {
            access_token: refreshed.access_token.clone(),
            // Providers may rotate or omit the refresh token on renewal; an
            // omitted one means "keep what you have".
            refresh_token: refreshed.refresh_token.or(current.refresh_token),
            // An out-of-range expires_in reads as no expiry (long-lived)
            // rather than panicking on a provider's bad arithmetic
            expires_at: refreshed
                .expires_in
                .and_then(Duration::try_seconds)
                .map(|ttl| Utc::now() + ttl),
            token_type: refreshed.token_type.or(current.token_type),
            scope: refreshed.scope.or(current.scope),
        };

        self.store
            .upsert(user_id, provider, &merged)
            .map_err(TokenError::Persistence)?;

        debug!(
            user_id = %user_id,
            provider = %provider,
            expires_at = ?merged.expires_at,
            "Access token refreshed and persisted"
        );

        Ok(merged.access_token)
    }

    /// Resolves the refresh endpoint and client credentials for a provider.
    fn resolve_endpoint(
        &self,
        provider: &str,
    ) -> Result<(String, Option<String>, Option<String>), TokenError> {
        if let Some(url) = &self.token_url_override {
            // Test mode: client credentials from env if present
            let env_prefix = provider.to_uppercase();
            let client_id = std::env::var(format!("PULSEBOARD_OAUTH_{}_CLIENT_ID", env_prefix)).ok();
            let client_secret =
                std::env::var(format!("PULSEBOARD_OAUTH_{}_CLIENT_SECRET", env_prefix)).ok();
            return Ok((url.clone(), client_id, client_secret));
        }

        let config = get_provider_config(provider).ok_or_else(|| {
            // Operator config problem, not a credential problem: retryable
            // once the env vars are set.
            TokenError::TransientRefreshFailure(format!(
                "OAuth client not configured for provider '{}'",
                provider
            ))
        })?;

        Ok((
            config.token_url,
            Some(config.client_id),
            Some(config.client_secret),
        ))
    }
}
