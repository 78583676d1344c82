//! OAuth 2.0 authorization flow for connecting creator platform accounts.
//!
//! Implements the authorization code flow:
//! 1. User clicks "Connect" in the dashboard
//! 2. GET /api/providers/:name/oauth/start → Redirect to platform
//! 3. User authorizes on the platform's site
//! 4. Platform redirects to /api/providers/:name/oauth/callback
//! 5. Exchange code for tokens, store encrypted credentials
//! 6. The account is now "connected" and the sync engine can pull metrics
//!
//! Also exposes disconnect (credential revocation) and a per-user connection
//! status listing.

mod exchange;
mod provider;
mod state;

pub use provider::{get_provider_config, is_valid_provider, provider_names, OAuthProviderConfig};
pub use state::{run_state_cleanup, PendingAuth, StateManager};

use crate::auth::extract_bearer_token;
use crate::credentials::CredentialStore;
use crate::token::TokenLifecycleManager;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for OAuth endpoints
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Shared application state for the OAuth API
#[derive(Clone)]
pub struct OAuthAppState {
    pub credential_store: Arc<CredentialStore>,
    pub token_manager: Arc<TokenLifecycleManager>,
    pub state_manager: StateManager,
    pub auth_enabled: bool,
    pub callback_base_url: String,
}

/// OAuth callback query parameters
#[derive(Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// OAuth success response
#[derive(Serialize)]
pub struct OAuthSuccessResponse {
    success: bool,
    message: String,
    provider: String,
}

/// Per-provider connection status
#[derive(Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub connected: bool,
}

#[derive(Serialize)]
struct ProviderListResponse {
    providers: Vec<ProviderStatus>,
}

/// Create the OAuth API router
pub fn create_oauth_router(state: OAuthAppState) -> Router {
    Router::new()
        .route("/api/providers", get(provider_status))
        .route("/api/providers/:name", delete(provider_disconnect))
        .route("/api/providers/:name/oauth/start", get(oauth_start))
        .route("/api/providers/:name/oauth/callback", get(oauth_callback))
        .with_state(Arc::new(state))
}

/// Resolve the requesting user from the Authorization header.
///
/// With auth disabled (local development) everything maps to "default".
fn resolve_user(state: &OAuthAppState, headers: &HeaderMap) -> Result<String, AppError> {
    if state.auth_enabled {
        extract_bearer_token(headers)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    } else {
        Ok("default".to_string())
    }
}

/// GET /api/providers
///
/// Lists every supported provider with its connection status for the
/// requesting user. Uses the non-throwing credential probe: a transient
/// refresh failure reads as "not connected" rather than a 5xx.
async fn provider_status(
    State(state): State<Arc<OAuthAppState>>,
    headers: HeaderMap,
) -> Result<Json<ProviderListResponse>, AppError> {
    let user_id = resolve_user(&state, &headers)?;

    let mut providers = Vec::new();
    for name in provider_names() {
        let connected = state.token_manager.has_valid_credential(&user_id, name).await;
        providers.push(ProviderStatus {
            name: name.to_string(),
            connected,
        });
    }

    Ok(Json(ProviderListResponse { providers }))
}

/// DELETE /api/providers/:name
///
/// Disconnects a provider: deletes the credential record and invalidates any
/// cached responses scoped to the pair. Idempotent.
async fn provider_disconnect(
    State(state): State<Arc<OAuthAppState>>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OAuthSuccessResponse>, AppError> {
    if !is_valid_provider(&provider_name) {
        return Err(AppError::NotFound(format!(
            "Provider '{}' not found",
            provider_name
        )));
    }

    let user_id = resolve_user(&state, &headers)?;

    state
        .token_manager
        .revoke(&user_id, &provider_name)
        .map_err(|e| {
            error!(
                user_id = %user_id,
                provider = %provider_name,
                error = %e,
                "Failed to revoke credentials"
            );
            AppError::ServerError(format!("Failed to disconnect: {}", e))
        })?;

    Ok(Json(OAuthSuccessResponse {
        success: true,
        message: format!("Disconnected {}", provider_name),
        provider: provider_name,
    }))
}

/// GET /api/providers/:name/oauth/start
///
/// Initiates the OAuth flow by redirecting the user to the platform's
/// authorization page.
///
/// # Security
/// - Requires bearer token (user id extracted from it)
/// - Generates a CSRF state parameter, stored in-memory with 10-minute expiry
async fn oauth_start(
    State(state): State<Arc<OAuthAppState>>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    debug!(provider = %provider_name, "OAuth start requested");

    if !is_valid_provider(&provider_name) {
        warn!(provider = %provider_name, "Unknown provider name");
        return Err(AppError::NotFound(format!(
            "Provider '{}' not found",
            provider_name
        )));
    }

    let user_id = resolve_user(&state, &headers)?;

    let provider_config = get_provider_config(&provider_name).ok_or_else(|| {
        error!(provider = %provider_name, "OAuth provider config not found (missing env vars?)");
        AppError::ServerError(format!(
            "OAuth not configured for provider '{}'. Set PULSEBOARD_OAUTH_{}_CLIENT_ID and PULSEBOARD_OAUTH_{}_CLIENT_SECRET.",
            provider_name,
            provider_name.to_uppercase(),
            provider_name.to_uppercase()
        ))
    })?;

    let csrf_state = state.state_manager.create_state(&provider_name, &user_id);

    let redirect_uri = format!(
        "{}/api/providers/{}/oauth/callback",
        state.callback_base_url, provider_name
    );

    let auth_url = provider_config.build_auth_url(&csrf_state, &redirect_uri);

    info!(
        provider = %provider_name,
        user_id = %user_id,
        "Redirecting to OAuth provider"
    );

    Ok(Redirect::temporary(&auth_url))
}

/// GET /api/providers/:name/oauth/callback
///
/// OAuth callback endpoint. Exchanges the authorization code for tokens and
/// stores the encrypted credential record.
///
/// # Security
/// - Validates the CSRF state parameter
/// - State is single-use (consumed on validation)
/// - User scoping comes from the state entry, not from the query string
async fn oauth_callback(
    State(state): State<Arc<OAuthAppState>>,
    Path(provider_name): Path<String>,
    Query(callback): Query<OAuthCallback>,
) -> Result<Response, AppError> {
    debug!(provider = %provider_name, "OAuth callback received");

    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(
            provider = %provider_name,
            error = %error,
            description = %description,
            "OAuth authorization failed"
        );
        return Err(AppError::BadRequest(format!(
            "OAuth authorization failed: {} - {}",
            error, description
        )));
    }

    let code = callback
        .code
        .ok_or_else(|| AppError::BadRequest("Missing 'code' parameter".to_string()))?;
    let csrf_state = callback
        .state
        .ok_or_else(|| AppError::BadRequest("Missing 'state' parameter".to_string()))?;

    // Validate and consume the CSRF state (single-use)
    let pending = state
        .state_manager
        .validate_and_consume(&csrf_state)
        .ok_or_else(|| {
            warn!(state = %csrf_state, "Invalid or expired OAuth state");
            AppError::Unauthorized(
                "Invalid or expired OAuth state (possible CSRF attack)".to_string(),
            )
        })?;

    if pending.provider != provider_name {
        error!(
            expected = %pending.provider,
            actual = %provider_name,
            "Provider name mismatch"
        );
        return Err(AppError::BadRequest("Provider name mismatch".to_string()));
    }

    let user_id = pending.user_id;

    let provider_config = get_provider_config(&provider_name).ok_or_else(|| {
        error!(provider = %provider_name, "OAuth provider config not found");
        AppError::ServerError(format!(
            "OAuth not configured for provider '{}'",
            provider_name
        ))
    })?;

    // Must match the redirect URI used in the start request
    let redirect_uri = format!(
        "{}/api/providers/{}/oauth/callback",
        state.callback_base_url, provider_name
    );

    debug!(provider = %provider_name, "Exchanging authorization code for token");
    let credentials = exchange::exchange_code_for_token(
        &provider_config.token_url,
        &code,
        &redirect_uri,
        &provider_config.client_id,
        &provider_config.client_secret,
    )
    .await
    .map_err(|e| {
        error!(
            provider = %provider_name,
            error = %e,
            "Token exchange failed"
        );
        AppError::BadGateway(format!("Failed to exchange authorization code: {}", e))
    })?;

    state
        .credential_store
        .upsert(&user_id, &provider_name, &credentials)
        .map_err(|e| {
            error!(
                provider = %provider_name,
                user_id = %user_id,
                error = %e,
                "Failed to store credentials"
            );
            AppError::ServerError(format!("Failed to store credentials: {}", e))
        })?;

    info!(
        provider = %provider_name,
        user_id = %user_id,
        has_refresh_token = credentials.refresh_token.is_some(),
        "OAuth flow completed successfully"
    );

    Ok(Json(OAuthSuccessResponse {
        success: true,
        message: format!("Successfully connected {}", provider_name),
        provider: provider_name,
    })
    .into_response())
}
