//! Durable per-day metrics snapshots.
//!
//! One row per (user, provider, day). A resync overwrites same-day values
//! instead of duplicating rows, so re-running a sync for any window is safe.

use crate::provider::DayMetrics;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// A stored metrics snapshot row.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsSnapshot {
    pub user_id: String,
    pub provider: String,
    pub day: NaiveDate,
    pub views: i64,
    pub engagement: i64,
    pub followers: i64,
}

/// SQLite-backed snapshot storage.
///
/// # Schema
/// ```sql
/// CREATE TABLE metrics_snapshots (
///     id INTEGER PRIMARY KEY,
///     user_id TEXT NOT NULL,
///     provider TEXT NOT NULL,
///     day TEXT NOT NULL,          -- ISO 8601 date
///     views INTEGER NOT NULL,
///     engagement INTEGER NOT NULL,
///     followers INTEGER NOT NULL,
///     updated_at TEXT NOT NULL,
///     UNIQUE(user_id, provider, day)
/// );
/// ```
///
/// Only the sync engine writes here; reporting handlers read via
/// [`SnapshotStore::get_range`].
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Creates or opens a snapshot store.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open snapshots database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS metrics_snapshots (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                day TEXT NOT NULL,
                views INTEGER NOT NULL,
                engagement INTEGER NOT NULL,
                followers INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, provider, day)
            )
            "#,
            [],
        )
        .context("Failed to create metrics_snapshots table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_snapshot_lookup
             ON metrics_snapshots(user_id, provider, day)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upserts one day's metrics (overwrite-by-day).
    pub fn upsert(&self, user_id: &str, provider: &str, metrics: &DayMetrics) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO metrics_snapshots (
                    user_id, provider, day, views, engagement, followers, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id, provider, day) DO UPDATE SET
                    views = excluded.views,
                    engagement = excluded.engagement,
                    followers = excluded.followers,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    provider,
                    metrics.date.to_string(),
                    metrics.views,
                    metrics.engagement,
                    metrics.followers,
                    now,
                ],
            )
            .context("Failed to upsert metrics snapshot")?;

        Ok(())
    }

    /// Returns all snapshots for a pair within an inclusive date range,
    /// ordered by day.
    pub fn get_range(
        &self,
        user_id: &str,
        provider: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MetricsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT day, views, engagement, followers
                FROM metrics_snapshots
                WHERE user_id = ?1 AND provider = ?2 AND day >= ?3 AND day <= ?4
                ORDER BY day
                "#,
            )
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map(
                params![user_id, provider, start.to_string(), end.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read results")?;

        rows.into_iter()
            .map(|(day, views, engagement, followers)| {
                Ok(MetricsSnapshot {
                    user_id: user_id.to_string(),
                    provider: provider.to_string(),
                    day: day.parse().context("Failed to parse snapshot day")?,
                    views,
                    engagement,
                    followers,
                })
            })
            .collect()
    }

    /// Deletes every snapshot for a (user, provider) pair. Returns the number
    /// of rows removed.
    pub fn delete_for_pair(&self, user_id: &str, provider: &str) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM metrics_snapshots WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider],
            )
            .context("Failed to delete snapshots")?;

        Ok(removed)
    }
}
