//! Platform metrics adapters.
//!
//! Each adapter wraps one platform's analytics API behind the
//! [`MetricsProvider`](crate::MetricsProvider) trait. All of them take a
//! custom base URL for testing against a mock server.

pub mod instagram;
pub mod twitter;
pub mod youtube;

pub use instagram::InstagramProvider;
pub use twitter::{cached_audience, TwitterAudience, TwitterProvider};
pub use youtube::YouTubeProvider;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;

/// Map known platform error codes to descriptive errors.
///
/// - 401 → auth error (token expired or invalid)
/// - 429 → rate limit
/// - Other non-2xx → generic API error
pub(crate) fn check_response_status(provider: &str, response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!(
            "{} auth error: token expired or invalid",
            provider
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("{} rate limit exceeded", provider)),
        s if !s.is_success() => Err(anyhow!("{} API error: {}", provider, s)),
        _ => Ok(()),
    }
}
