//! Twitter/X analytics adapter.
//!
//! The daily insight endpoint only answers single-day queries, so this
//! adapter keeps the default `batch_days` of 1 and the engine calls it once
//! per day in the window.
//!
//! The audience lookup is a read-mostly call and goes through the response
//! cache via [`cached_audience`]; daily metrics pulls never do.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use pulseboard::cache::ResponseCache;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::check_response_status;
use crate::provider::{DayMetrics, MetricsProvider};

const BASE_URL: &str = "https://api.twitter.com";

#[derive(Debug, Deserialize)]
struct DailyInsightResponse {
    data: DailyInsight,
}

#[derive(Debug, Deserialize)]
struct DailyInsight {
    date: NaiveDate,
    impressions: i64,
    engagements: i64,
    followers_count: i64,
}

#[derive(Debug, Deserialize)]
struct AudienceResponse {
    data: AudienceData,
}

#[derive(Debug, Deserialize)]
struct AudienceData {
    username: String,
    public_metrics: PublicMetrics,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    followers_count: i64,
    following_count: i64,
    tweet_count: i64,
}

/// Account-level audience summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TwitterAudience {
    pub username: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub tweet_count: i64,
}

/// HTTP client for the Twitter/X analytics API.
pub struct TwitterProvider {
    http_client: Client,
    base_url: String,
}

impl Default for TwitterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitterProvider {
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

    /// Fetch the account's audience summary (followers, following, tweets).
    pub async fn fetch_audience(&self, access_token: &str) -> Result<TwitterAudience> {
        let url = format!("{}/2/users/me?user.fields=public_metrics", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send Twitter audience request")?;

        check_response_status("Twitter", &response)?;
        let body = response
            .json::<AudienceResponse>()
            .await
            .context("Failed to parse Twitter audience response")?;

        Ok(TwitterAudience {
            username: body.data.username,
            followers_count: body.data.public_metrics.followers_count,
            following_count: body.data.public_metrics.following_count,
            tweet_count: body.data.public_metrics.tweet_count,
        })
    }
}

#[async_trait]
impl MetricsProvider for TwitterProvider {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch_range(
        &self,
        access_token: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DayMetrics>> {
        // batch_days is 1, so start == end
        let url = format!(
            "{}/2/users/me/metrics/daily?date={}",
            self.base_url, start
        );
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send Twitter daily insight request")?;

        check_response_status("Twitter", &response)?;
        let body = response
            .json::<DailyInsightResponse>()
            .await
            .context("Failed to parse Twitter daily insight response")?;

        Ok(vec![DayMetrics {
            date: body.data.date,
            views: body.data.impressions,
            engagement: body.data.engagements,
            followers: body.data.followers_count,
        }])
    }
}

/// Audience lookup with the response cache in front.
///
/// A cache hit skips the network entirely. A miss fetches, stores under the
/// key `"{user}:twitter:audience"` with the cache's default TTL, and returns
/// the fresh value.
pub async fn cached_audience(
    cache: &ResponseCache,
    provider: &TwitterProvider,
    user_id: &str,
    access_token: &str,
) -> Result<TwitterAudience> {
    let key = ResponseCache::scoped_key(user_id, "twitter", "audience");

    if let Some(value) = cache.get(&key) {
        if let Ok(audience) = serde_json::from_value::<TwitterAudience>(value) {
            return Ok(audience);
        }
        // A malformed cached value falls through to a fresh fetch
        cache.delete(&key);
    }

    let audience = provider.fetch_audience(access_token).await?;
    cache.set(
        &key,
        serde_json::to_value(&audience).context("Failed to serialize audience")?,
        None,
    );
    Ok(audience)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_range_single_day() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/2/users/me/metrics/daily?date=2026-08-15")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": {
                        "date": "2026-08-15",
                        "impressions": 5400,
                        "engagements": 320,
                        "followers_count": 1200
                    }
                }"#,
            )
            .create_async()
            .await;

        let provider = TwitterProvider::with_base_url(server.url());
        let days = provider
            .fetch_range("tok", "2026-08-15".parse().unwrap(), "2026-08-15".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "2026-08-15".parse::<NaiveDate>().unwrap());
        assert_eq!(days[0].views, 5400);
        assert_eq!(days[0].engagement, 320);
        assert_eq!(days[0].followers, 1200);
    }

    #[tokio::test]
    async fn test_fetch_audience() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/2/users/me?user.fields=public_metrics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": {
                        "id": "123",
                        "username": "creator",
                        "public_metrics": {
                            "followers_count": 1200,
                            "following_count": 80,
                            "tweet_count": 4100
                        }
                    }
                }"#,
            )
            .create_async()
            .await;

        let provider = TwitterProvider::with_base_url(server.url());
        let audience = provider.fetch_audience("tok").await.unwrap();

        assert_eq!(audience.username, "creator");
        assert_eq!(audience.followers_count, 1200);
        assert_eq!(audience.tweet_count, 4100);
    }

    #[tokio::test]
    async fn test_cached_audience_hits_network_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/2/users/me?user.fields=public_metrics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": {
                        "id": "123",
                        "username": "creator",
                        "public_metrics": {
                            "followers_count": 1200,
                            "following_count": 80,
                            "tweet_count": 4100
                        }
                    }
                }"#,
            )
            .expect(1)
            .create_async()
            .await;

        let provider = TwitterProvider::with_base_url(server.url());
        let cache = ResponseCache::new();

        let first = cached_audience(&cache, &provider, "u1", "tok").await.unwrap();
        let second = cached_audience(&cache, &provider, "u1", "tok").await.unwrap();

        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_429_rate_limit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/2/users/me/metrics/daily?date=2026-08-15")
            .with_status(429)
            .with_body(r#"{"title": "Too Many Requests"}"#)
            .create_async()
            .await;

        let provider = TwitterProvider::with_base_url(server.url());
        let err = provider
            .fetch_range("tok", "2026-08-15".parse().unwrap(), "2026-08-15".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limit exceeded"));
    }
}
