//! Provider adapter interface.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's normalized analytics counters.
///
/// Every provider's native response is mapped into this shape before it
/// reaches storage; nothing provider-specific survives past the adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayMetrics {
    pub date: NaiveDate,
    /// Content views / impressions for the day
    pub views: i64,
    /// Likes, replies, shares — whatever the platform counts as engagement
    pub engagement: i64,
    /// Follower/subscriber count delta or total, per the platform's reporting
    pub followers: i64,
}

/// A platform's metrics API, normalized behind one interface.
///
/// Implementations map their platform's failure shapes into plain errors; the
/// engine treats any `Err` from [`MetricsProvider::fetch_range`] as one
/// failed unit of work and moves on.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Provider identifier, matching the credential store's provider column
    /// (e.g. "youtube").
    fn name(&self) -> &str;

    /// Largest date span one metrics query may cover.
    ///
    /// 1 means the API only answers per-day queries; the engine then issues
    /// one call per day. Providers with batch range endpoints return their
    /// supported span and receive correspondingly fewer calls.
    fn batch_days(&self) -> i64 {
        1
    }

    /// Fetch normalized metrics for an inclusive date range.
    ///
    /// `start <= end` and `end - start < batch_days()` are guaranteed by the
    /// caller. A malformed response fails the whole unit; implementations do
    /// not partially succeed within a range.
    async fn fetch_range(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayMetrics>>;
}
