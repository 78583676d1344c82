//! OAuth provider configurations for the supported creator platforms.

use serde::{Deserialize, Serialize};

/// OAuth 2.0 endpoints and client configuration for one platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Authorization endpoint URL
    pub auth_url: String,

    /// Token exchange / refresh endpoint URL
    pub token_url: String,

    /// Scopes requested during authorization
    pub scopes: Vec<String>,

    /// Client ID (from environment variable)
    pub client_id: String,

    /// Client secret (from environment variable)
    pub client_secret: String,
}

impl OAuthProviderConfig {
    /// Build the authorization URL with CSRF state and redirect URI.
    pub fn build_auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code&access_type=offline",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }
}

/// Get OAuth configuration for a provider by name.
///
/// Client ID and secret come from `PULSEBOARD_OAUTH_{NAME}_CLIENT_ID` /
/// `PULSEBOARD_OAUTH_{NAME}_CLIENT_SECRET`; returns `None` when either is
/// unset or the provider is unknown.
pub fn get_provider_config(provider: &str) -> Option<OAuthProviderConfig> {
    let env_prefix = provider.to_uppercase();
    let client_id = std::env::var(format!("PULSEBOARD_OAUTH_{}_CLIENT_ID", env_prefix)).ok()?;
    let client_secret =
        std::env::var(format!("PULSEBOARD_OAUTH_{}_CLIENT_SECRET", env_prefix)).ok()?;

    let (auth_url, token_url, scopes) = match provider {
        "youtube" => (
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
            vec![
                "https://www.googleapis.com/auth/yt-analytics.readonly",
                "https://www.googleapis.com/auth/youtube.readonly",
            ],
        ),
        "twitter" => (
            "https://twitter.com/i/oauth2/authorize",
            "https://api.twitter.com/2/oauth2/token",
            vec!["tweet.read", "users.read", "offline.access"],
        ),
        "instagram" => (
            "https://api.instagram.com/oauth/authorize",
            "https://api.instagram.com/oauth/access_token",
            vec!["instagram_basic", "instagram_manage_insights"],
        ),
        _ => return None,
    };

    Some(OAuthProviderConfig {
        auth_url: auth_url.to_string(),
        token_url: token_url.to_string(),
        scopes: scopes.into_iter().map(|s| s.to_string()).collect(),
        client_id,
        client_secret,
    })
}

/// Check whether a provider name is one we integrate with.
pub fn is_valid_provider(name: &str) -> bool {
    matches!(name, "youtube" | "twitter" | "instagram")
}

/// All supported provider names.
pub fn provider_names() -> &'static [&'static str] {
    &["youtube", "twitter", "instagram"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_provider_names() {
        assert!(is_valid_provider("youtube"));
        assert!(is_valid_provider("twitter"));
        assert!(is_valid_provider("instagram"));
        assert!(!is_valid_provider("myspace"));
        assert!(!is_valid_provider(""));
    }

    #[test]
    fn test_build_auth_url() {
        let config = OAuthProviderConfig {
            auth_url: "https://example.com/oauth/authorize".to_string(),
            token_url: "https://example.com/oauth/token".to_string(),
            scopes: vec!["read".to_string(), "offline.access".to_string()],
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
        };

        let url = config.build_auth_url("random_state", "http://localhost:3000/callback");

        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("scope=read%20offline.access"));
        assert!(url.contains("state=random_state"));
        assert!(url.contains("response_type=code"));
    }
}
