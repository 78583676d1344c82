//! Instagram Graph insights adapter.
//!
//! The insights endpoint accepts a since/until range, so this adapter
//! advertises 30-day batches like the YouTube one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::check_response_status;
use crate::provider::{DayMetrics, MetricsProvider};

const BASE_URL: &str = "https://graph.instagram.com";
const BATCH_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<DailyInsight>,
}

#[derive(Debug, Deserialize)]
struct DailyInsight {
    end_time: NaiveDate,
    impressions: i64,
    total_interactions: i64,
    follower_count: i64,
}

/// HTTP client for the Instagram Graph insights API.
pub struct InstagramProvider {
    http_client: Client,
    base_url: String,
}

impl Default for InstagramProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InstagramProvider {
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
impl MetricsProvider for InstagramProvider {
    fn name(&self) -> &str {
        "instagram"
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
            "{}/me/insights?metric=impressions%2Ctotal_interactions%2Cfollower_count&period=day&since={}&until={}",
            self.base_url, start, end
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send Instagram insights request")?;

        check_response_status("Instagram", &response)?;
        let body = response
            .json::<InsightsResponse>()
            .await
            .context("Failed to parse Instagram insights response")?;

        Ok(body
            .data
            .into_iter()
            .map(|day| DayMetrics {
                date: day.end_time,
                views: day.impressions,
                engagement: day.total_interactions,
                followers: day.follower_count,
            })
            .collect())
    }
}
