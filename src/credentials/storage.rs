//! SQLite-backed credential storage with transparent encryption.

use super::{encryption, Credentials};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE credentials (
///     id INTEGER PRIMARY KEY,
///     user_id TEXT NOT NULL,
///     provider TEXT NOT NULL,
///     access_token TEXT NOT NULL,       -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     refresh_token TEXT,               -- Encrypted (optional)
///     refresh_token_nonce TEXT,
///     expires_at TEXT,                  -- ISO 8601 (optional)
///     token_type TEXT,
///     scope TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL,
///     UNIQUE(user_id, provider)
/// );
/// ```
///
/// # Thread safety
/// The connection is wrapped in a Mutex; SQLite runs in serialized mode, so
/// the upsert is atomic per (user_id, provider) key. Only the token lifecycle
/// manager writes, so last-write-wins on concurrent upserts is acceptable.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl CredentialStore {
    /// Creates or opens a credential store.
    ///
    /// `encryption_key` is the base64-encoded 32-byte master key.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes =
            encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open credentials database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                refresh_token TEXT,
                refresh_token_nonce TEXT,
                expires_at TEXT,
                token_type TEXT,
                scope TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, provider)
            )
            "#,
            [],
        )
        .context("Failed to create credentials table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_provider ON credentials(user_id, provider)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Stores credentials for a user and provider (idempotent upsert).
    ///
    /// An existing record for the same (user, provider) pair is replaced.
    pub fn upsert(&self, user_id: &str, provider: &str, credentials: &Credentials) -> Result<()> {
        let (access_token_encrypted, access_token_nonce) =
            encryption::encrypt(&credentials.access_token, &self.encryption_key)
                .context("Failed to encrypt access token")?;

        let (refresh_token_encrypted, refresh_token_nonce) = match &credentials.refresh_token {
            Some(token) => {
                let (encrypted, nonce) = encryption::encrypt(token, &self.encryption_key)
                    .context("Failed to encrypt refresh token")?;
                (Some(encrypted), Some(nonce))
            }
            None => (None, None),
        };

        let expires_at = credentials.expires_at.map(|dt| dt.to_rfc3339());
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO credentials (
                    user_id, provider,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    expires_at, token_type, scope,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(user_id, provider) DO UPDATE SET
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    expires_at = excluded.expires_at,
                    token_type = excluded.token_type,
                    scope = excluded.scope,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    provider,
                    access_token_encrypted,
                    access_token_nonce,
                    refresh_token_encrypted,
                    refresh_token_nonce,
                    expires_at,
                    credentials.token_type,
                    credentials.scope,
                    now,
                    now,
                ],
            )
            .context("Failed to store credentials")?;

        Ok(())
    }

    /// Retrieves credentials for a user and provider.
    ///
    /// Returns `Ok(None)` when no record exists.
    pub fn get(&self, user_id: &str, provider: &str) -> Result<Option<Credentials>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce,
                       expires_at, token_type, scope
                FROM credentials
                WHERE user_id = ?1 AND provider = ?2
                "#,
            )
            .context("Failed to prepare query")?;

        let mut rows = stmt
            .query(params![user_id, provider])
            .context("Failed to execute query")?;

        if let Some(row) = rows.next().context("Failed to read row")? {
            let access_token_encrypted: String = row.get(0)?;
            let access_token_nonce: String = row.get(1)?;
            let access_token = encryption::decrypt(
                &access_token_encrypted,
                &access_token_nonce,
                &self.encryption_key,
            )
            .context("Failed to decrypt access token")?;

            let refresh_token: Option<String> = row.get(2)?;
            let refresh_token_nonce: Option<String> = row.get(3)?;
            let refresh_token = match (refresh_token, refresh_token_nonce) {
                (Some(encrypted), Some(nonce)) => Some(
                    encryption::decrypt(&encrypted, &nonce, &self.encryption_key)
                        .context("Failed to decrypt refresh token")?,
                ),
                _ => None,
            };

            let expires_at: Option<String> = row.get(4)?;
            let expires_at = expires_at
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
                .transpose()
                .context("Failed to parse expires_at timestamp")?;

            Ok(Some(Credentials {
                access_token,
                refresh_token,
                expires_at,
                token_type: row.get(5)?,
                scope: row.get(6)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Deletes credentials for a user and provider.
    ///
    /// Idempotent: deleting an absent record is not an error.
    /// Returns whether a record was actually removed.
    pub fn delete(&self, user_id: &str, provider: &str) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM credentials WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider],
            )
            .context("Failed to delete credentials")?;

        Ok(rows_affected > 0)
    }

    /// Lists all (user_id, provider) pairs across all users.
    ///
    /// Used by the sync scheduler to enumerate every connected account.
    pub fn list_all(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT user_id, provider FROM credentials ORDER BY user_id, provider")
            .context("Failed to prepare query")?;

        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to execute query")?
            .collect::<Result<Vec<(String, String)>, _>>()
            .context("Failed to read results")?;

        Ok(pairs)
    }

    /// Lists all providers with stored credentials for a user.
    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT provider FROM credentials WHERE user_id = ?1 ORDER BY provider")
            .context("Failed to prepare query")?;

        let providers = stmt
            .query_map(params![user_id], |row| row.get(0))
            .context("Failed to execute query")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read results")?;

        Ok(providers)
    }
}
