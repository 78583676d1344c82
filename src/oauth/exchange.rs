//! Authorization-code exchange.
//!
//! Turns the code from the OAuth callback into a stored credential record.

use crate::credentials::Credentials;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Standard OAuth 2.0 token response.
///
/// `refresh_token` and `expires_in` are optional: not all providers issue a
/// refresh token on every grant, and some tokens are long-lived.
#[derive(Deserialize, Debug)]
struct TokenResponse {
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

/// Exchange an authorization code for credentials.
///
/// POSTs `grant_type=authorization_code` to the provider's token endpoint and
/// maps the response into a [`Credentials`] record (relative `expires_in`
/// becomes an absolute `expires_at`).
pub async fn exchange_code_for_token(
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<Credentials> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("code", code);
    form_data.insert("redirect_uri", redirect_uri);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!(token_url = %token_url, "Exchanging authorization code for token");

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form_data)
        .send()
        .await
        .context("Failed to send token exchange request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        return Err(anyhow!(
            "Token exchange failed with status {}: {}",
            status,
            body
        ));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    tracing::debug!(
        has_refresh_token = token_response.refresh_token.is_some(),
        expires_in = ?token_response.expires_in,
        "Token exchange successful"
    );

    // An out-of-range expires_in reads as no expiry rather than panicking
    let expires_at = token_response
        .expires_in
        .and_then(Duration::try_seconds)
        .map(|ttl| Utc::now() + ttl);

    Ok(Credentials {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_at,
        token_type: token_response.token_type,
        scope: token_response.scope,
    })
}
