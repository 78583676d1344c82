// Integration tests for the provider connection API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use pulseboard::cache::ResponseCache;
use pulseboard::credentials::{CredentialStore, Credentials};
use pulseboard::oauth::{create_oauth_router, OAuthAppState, StateManager};
use pulseboard::token::TokenLifecycleManager;
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app() -> (Router, Arc<CredentialStore>) {
    let key = BASE64.encode([0u8; 32]);
    let credential_store = Arc::new(CredentialStore::new(":memory:", &key).unwrap());
    let cache = Arc::new(ResponseCache::new());

    let token_manager = Arc::new(TokenLifecycleManager::new(
        Arc::clone(&credential_store),
        cache,
    ));

    let state = OAuthAppState {
        credential_store: Arc::clone(&credential_store),
        token_manager,
        state_manager: StateManager::new(600),
        auth_enabled: false,
        callback_base_url: "http://localhost:3000".to_string(),
    };

    (create_oauth_router(state), credential_store)
}

fn valid_credentials() -> Credentials {
    Credentials {
        access_token: "test_token".to_string(),
        refresh_token: Some("test_refresh".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        token_type: Some("Bearer".to_string()),
        scope: None,
    }
}

#[tokio::test]
async fn test_provider_status_nothing_connected() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let providers = json["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 3);

    for provider in providers {
        assert_eq!(provider["connected"], false);
    }

    let names: Vec<String> = providers
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"youtube".to_string()));
    assert!(names.contains(&"twitter".to_string()));
    assert!(names.contains(&"instagram".to_string()));
}

#[tokio::test]
async fn test_provider_status_with_valid_credential() {
    let (app, store) = create_test_app();

    // Auth is disabled, so handlers resolve the user to "default"
    store
        .upsert("default", "youtube", &valid_credentials())
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    for provider in json["providers"].as_array().unwrap() {
        let expected = provider["name"] == "youtube";
        assert_eq!(provider["connected"], expected);
    }
}

#[tokio::test]
async fn test_disconnect_removes_credential() {
    let (app, store) = create_test_app();

    store
        .upsert("default", "twitter", &valid_credentials())
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/providers/twitter")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.get("default", "twitter").unwrap().is_none());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (app, _store) = create_test_app();

    // Nothing connected — disconnect still succeeds
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/providers/instagram")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disconnect_unknown_provider() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/providers/myspace")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oauth_callback_rejects_unknown_state() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/providers/youtube/oauth/callback?code=abc&state=never-issued")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_oauth_callback_missing_code() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/providers/youtube/oauth/callback?state=something")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
