//! Bearer token extraction for API handlers.
//!
//! The surrounding identity provider hands each request a stable, opaque user
//! identifier as a bearer token. This module only parses the header; no
//! identity verification happens here.

use axum::http::HeaderMap;

/// Extract bearer token from the HTTP Authorization header.
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, BearerError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

/// Parse the token out of an "Bearer <token>" header value.
fn parse_bearer_token(header_value: &str) -> Result<String, BearerError> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 || parts[0].to_lowercase() != "bearer" {
        return Err(BearerError::InvalidFormat);
    }

    let token = parts[1].trim();
    if token.is_empty() {
        return Err(BearerError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum BearerError {
    /// Authorization header not present
    Missing,
    /// Not "Bearer <token>"
    InvalidFormat,
    /// Token is an empty string
    Empty,
}

impl std::fmt::Display for BearerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BearerError::Missing => write!(f, "Authorization token not provided"),
            BearerError::InvalidFormat => write!(f, "Invalid authorization token format"),
            BearerError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for BearerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extracts_valid_bearer_token() {
        let headers = headers_with_auth("Bearer user-abc-123");
        assert_eq!(
            extract_bearer_token(&headers).unwrap(),
            "user-abc-123".to_string()
        );
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let headers = headers_with_auth("bearer user-abc-123");
        assert!(extract_bearer_token(&headers).is_ok());
    }

    #[test]
    fn test_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), Err(BearerError::Missing));
    }

    #[test]
    fn test_wrong_scheme() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert_eq!(
            extract_bearer_token(&headers),
            Err(BearerError::InvalidFormat)
        );
    }

    #[test]
    fn test_empty_token() {
        let headers = headers_with_auth("Bearer  ");
        assert_eq!(extract_bearer_token(&headers), Err(BearerError::Empty));
    }
}
