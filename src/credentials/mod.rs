//! Encrypted credential storage for platform OAuth tokens.
//!
//! One credential record exists per (user, provider) pair. Access and refresh
//! tokens are encrypted at rest with AES-256-GCM and stored in SQLite.
//!
//! # Usage
//!
//! ```no_run
//! use pulseboard::credentials::{CredentialStore, Credentials};
//! use chrono::{Utc, Duration};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("PULSEBOARD_ENCRYPTION_KEY")?;
//! let store = CredentialStore::new("credentials.db", &encryption_key)?;
//!
//! let creds = Credentials {
//!     access_token: "ya29.a0AfH6...".to_string(),
//!     refresh_token: Some("1//0gFh3...".to_string()),
//!     expires_at: Some(Utc::now() + Duration::hours(1)),
//!     token_type: Some("Bearer".to_string()),
//!     scope: Some("yt-analytics.readonly".to_string()),
//! };
//! store.upsert("user1", "youtube", &creds)?;
//!
//! if let Some(creds) = store.get("user1", "youtube")? {
//!     println!("Access token: {}", creds.access_token);
//! }
//!
//! store.delete("user1", "youtube")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Tokens encrypted at rest with AES-256-GCM, unique nonce per token
//! - Master key is 32 bytes, held in memory only (from env var)
//! - Authenticated encryption (tampering detected)
//! - SQLite ACID guarantees make the upsert atomic per key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use storage::CredentialStore;

pub use encryption::{decrypt, encrypt, validate_key};

/// Credential record for one user on one external platform.
///
/// Created on authorization-code exchange, mutated in place on every refresh,
/// deleted on disconnect. `token_type` and `scope` are informational only and
/// never drive control flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token (bearer credential for API requests)
    pub access_token: String,

    /// OAuth refresh token. Absent means the credential cannot be silently
    /// renewed and is terminal once it expires.
    pub refresh_token: Option<String>,

    /// Absolute expiry of the access token (UTC). Absent means long-lived:
    /// no proactive refresh is attempted.
    pub expires_at: Option<DateTime<Utc>>,

    /// Token type as reported by the provider (usually "Bearer")
    pub token_type: Option<String>,

    /// Space-separated scopes granted by the user
    pub scope: Option<String>,
}
