// Bearer token extraction for API handlers
pub mod auth;

// Process-wide response cache for provider API calls
pub mod cache;

// Configuration loading
pub mod config;

// Encrypted credential storage
pub mod credentials;

// OAuth 2.0 authorization flow (HTTP API)
pub mod oauth;

// Token lifecycle management (refresh, revoke)
pub mod token;
