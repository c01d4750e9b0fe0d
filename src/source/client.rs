//! HTTP client for the upstream load API.
//!
//! One request per calendar day (`?date=YYYY-MM-DD`). Requests are bounded
//! by a timeout and retried with a linear backoff; a 404 means the day has
//! not been published and is not retried.

use crate::analysis::engine::{DayInput, RefreshInput};
use crate::config::SourceConfig;
use crate::models::RawSample;
use crate::source::payload::{local_days, parse_upstream, select_day, ValueScale};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for the upstream load API.
pub struct LoadClient {
    http_client: reqwest::Client,
    api_url: String,
    timeout_seconds: u64,
    retries: usize,
    retry_backoff: Duration,
    scale: ValueScale,
}

impl LoadClient {
    /// Create a client from source settings.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("eklok/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            scale: config.scale,
        })
    }

    /// Fetch today and tomorrow concurrently.
    ///
    /// Today must succeed. Any tomorrow failure leaves tomorrow absent.
    pub async fn fetch_cycle(&self, now: DateTime<Utc>, tz: &Tz) -> Result<RefreshInput> {
        let (today, tomorrow) = local_days(now, tz);

        let (today_result, tomorrow_result) =
            futures::join!(self.fetch_day(today, tz), self.fetch_day(tomorrow, tz));

        let today_samples = today_result
            .with_context(|| format!("Failed to fetch today's series ({})", today))?
            .ok_or_else(|| anyhow!("Today's series ({}) is not published", today))?;

        let tomorrow_input = match tomorrow_result {
            Ok(Some(samples)) => Some(DayInput::new(tomorrow, samples)),
            Ok(None) => {
                debug!("Tomorrow's series ({}) is not published yet", tomorrow);
                None
            }
            Err(e) => {
                warn!("Failed to fetch tomorrow's series ({}): {:#}", tomorrow, e);
                None
            }
        };

        info!(
            "Fetched {} samples for today, tomorrow: {}",
            today_samples.len(),
            tomorrow_input
                .as_ref()
                .map_or_else(|| "absent".to_string(), |d| format!("{} samples", d.samples.len()))
        );

        Ok(RefreshInput {
            today: DayInput::new(today, today_samples),
            tomorrow: tomorrow_input,
            fetched_at: Utc::now(),
        })
    }

    /// Fetch one local day. `Ok(None)` when the day is not published.
    pub async fn fetch_day(&self, day: NaiveDate, tz: &Tz) -> Result<Option<Vec<RawSample>>> {
        let mut attempt = 0;
        loop {
            match self.request_day(day).await {
                Ok(Some(body)) => {
                    let samples = parse_upstream(&body, self.scale)?;
                    return Ok(Some(select_day(samples, day, tz)));
                }
                Ok(None) => return Ok(None),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt as u32;
                    warn!(
                        "Request for {} failed (attempt {}/{}): {:#}. Retrying in {:?}",
                        day,
                        attempt,
                        self.retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request for one day. `Ok(None)` on 404.
    async fn request_day(&self, day: NaiveDate) -> Result<Option<String>> {
        let date = day.format("%Y-%m-%d").to_string();
        debug!("GET {}?date={}", self.api_url, date);

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[("date", date.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request timed out after {}s", self.timeout_seconds)
                } else if e.is_connect() {
                    anyhow!("Cannot connect to {}", self.api_url)
                } else {
                    anyhow!("Failed to send request: {}", e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Upstream API error {}: {}", status, body));
        }

        let body = response
            .text()
            .await
            .context("Failed to read upstream response")?;
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let config = SourceConfig::default();
        let client = LoadClient::new(&config).unwrap();
        assert_eq!(client.api_url, "https://eklok.nl/api/pricedetail");
        assert_eq!(client.retries, 2);
        assert_eq!(client.retry_backoff, Duration::from_millis(500));
        assert_eq!(client.scale, ValueScale::Signed);
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported_after_retries() {
        let config = SourceConfig {
            // Port 9 (discard) on localhost is closed in test environments.
            api_url: "http://127.0.0.1:9/api".to_string(),
            timeout_seconds: 2,
            retries: 1,
            retry_backoff_ms: 1,
            scale: ValueScale::Percent,
        };
        let client = LoadClient::new(&config).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let result = client.fetch_day(day, &chrono_tz::UTC).await;
        assert!(result.is_err());
    }
}
