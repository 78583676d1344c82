//! YouTube Analytics adapter.
//!
//! The reports endpoint answers a whole date range in one call, so this
//! adapter advertises 30-day batches and the engine issues one request per
//! window instead of thirty.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::check_response_status;
use crate::provider::{DayMetrics, MetricsProvider};

const BASE_URL: &str = "https://youtubeanalytics.googleapis.com";
const BATCH_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

/// One day of the channel report.
#[derive(Debug, Deserialize)]
struct ReportRow {
    day: NaiveDate,
    views: i64,
    likes: i64,
    comments: i64,
    #[serde(rename = "subscribersGained")]
    subscribers_gained: i64,
}

/// HTTP client for the YouTube Analytics channel reports API.
pub struct YouTubeProvider {
    http_client: Client,
    base_url: String,
}

impl Default for YouTubeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeProvider {
    /// Create a provider using the default API base URL.
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Create a provider with a custom base URL (for testing with a mock server).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl MetricsProvider for YouTubeProvider {
    fn name(&self) -> &str {
        "youtube"
    }

    fn batch_days(&self) -> i64 {
        BATCH_DAYS
    }

    async fn fetch_range(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayMetrics>> {
        let url = format!(
            "{}/v2/reports?ids=channel%3D%3DMINE&dimensions=day&metrics=views%2Clikes%2Ccomments%2CsubscribersGained&startDate={}&endDate={}",
            self.base_url, start, end
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send YouTube report request")?;

        check_response_status("YouTube", &response)?;
        let report = response
            .json::<ReportResponse>()
            .await
            .context("Failed to parse YouTube report response")?;

        Ok(report
            .rows
            .into_iter()
            .map(|row| DayMetrics {
                date: row.day,
                views: row.views,
                engagement: row.likes + row.comments,
                followers: row.subscribers_gained,
            })
            .collect())
    }
}
