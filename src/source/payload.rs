//! Decoding of upstream payloads and offline series files.
//!
//! The upstream API reports a signed `range` per slot (-100 best, +100
//! worst) with UTC timestamps. Here it is turned into boundary samples on
//! the 0..100 scale and cut to one local calendar day. Values are never
//! clamped: an out-of-range value stays out of range and fails validation
//! in the engine.

use crate::analysis::engine::{DayInput, RefreshInput};
use crate::models::RawSample;
use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Scale of the upstream `range` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueScale {
    /// -100..+100, mapped linearly onto 0..100
    #[default]
    Signed,
    /// Already 0..100
    Percent,
}

impl ValueScale {
    pub fn normalize(&self, raw: f64) -> f64 {
        match self {
            ValueScale::Signed => (raw + 100.0) / 2.0,
            ValueScale::Percent => raw,
        }
    }
}

/// The API wraps its list in `{"data": [...]}`, older responses are a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamPayload {
    Wrapped { data: Vec<Value> },
    Bare(Vec<Value>),
}

/// Decode an upstream response body into samples.
///
/// Items without a parsable `date` or a numeric `range` are skipped.
pub fn parse_upstream(body: &str, scale: ValueScale) -> Result<Vec<RawSample>> {
    let payload: UpstreamPayload =
        serde_json::from_str(body).context("Failed to parse upstream payload")?;

    let items = match payload {
        UpstreamPayload::Wrapped { data } => data,
        UpstreamPayload::Bare(items) => items,
    };

    let mut samples = Vec::with_capacity(items.len());
    for item in &items {
        let Some(date) = item.get("date").and_then(Value::as_str) else {
            debug!("Skipping item without date: {}", item);
            continue;
        };
        let timestamp = match parse_timestamp(date) {
            Some(ts) => ts,
            None => {
                debug!("Skipping item with unparsable date: {}", date);
                continue;
            }
        };
        let Some(range) = item.get("range").and_then(Value::as_f64) else {
            debug!("Skipping item without numeric range at {}", date);
            continue;
        };

        samples.push(RawSample::new(timestamp, scale.normalize(range)));
    }

    debug!("Decoded {} of {} upstream items", samples.len(), items.len());
    Ok(samples)
}

/// Parse an RFC 3339 timestamp; a missing offset is read as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<chrono::NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// Keep the samples of one local day, ordered, first of any duplicate timestamp.
pub fn select_day(mut samples: Vec<RawSample>, day: NaiveDate, tz: &Tz) -> Vec<RawSample> {
    samples.retain(|s| s.timestamp.with_timezone(tz).date_naive() == day);
    samples.sort_by_key(|s| s.timestamp);

    let before = samples.len();
    samples.dedup_by_key(|s| s.timestamp);
    let dropped = before - samples.len();
    if dropped > 0 {
        warn!("Dropped {} upstream samples with duplicate timestamps on {}", dropped, day);
    }
    samples
}

/// Local calendar dates of today and tomorrow at `now`.
pub fn local_days(now: DateTime<Utc>, tz: &Tz) -> (NaiveDate, NaiveDate) {
    let today = now.with_timezone(tz).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    (today, tomorrow)
}

/// Offline series file: samples already on the 0..100 scale.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesFile {
    pub today: Vec<RawSample>,
    #[serde(default)]
    pub tomorrow: Option<Vec<RawSample>>,
}

impl SeriesFile {
    /// Turn the file contents into refresh input.
    ///
    /// Samples are passed through untouched so that ordering and range
    /// problems surface as validation failures. Today's date is taken from
    /// its first sample, or from `fetched_at` when today is empty.
    pub fn into_input(self, tz: &Tz, fetched_at: DateTime<Utc>) -> RefreshInput {
        let today_day = self
            .today
            .first()
            .map(|s| s.timestamp.with_timezone(tz).date_naive())
            .unwrap_or_else(|| local_days(fetched_at, tz).0);
        let tomorrow_day = today_day
            .checked_add_days(Days::new(1))
            .unwrap_or(today_day);

        RefreshInput {
            today: DayInput::new(today_day, self.today),
            tomorrow: self.tomorrow.map(|s| DayInput::new(tomorrow_day, s)),
            fetched_at,
        }
    }
}

/// Read an offline series file.
pub async fn load_series_file(path: &Path) -> Result<SeriesFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_normalize_signed_scale() {
        assert_eq!(ValueScale::Signed.normalize(-100.0), 0.0);
        assert_eq!(ValueScale::Signed.normalize(0.0), 50.0);
        assert_eq!(ValueScale::Signed.normalize(100.0), 100.0);
        assert_eq!(ValueScale::Signed.normalize(-57.0), 21.5);
        assert_eq!(ValueScale::Percent.normalize(42.0), 42.0);
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        assert_eq!(ValueScale::Signed.normalize(150.0), 125.0);
    }

    #[test]
    fn test_parse_wrapped_payload() {
        let body = r##"{"data": [
            {"date": "2025-03-01T10:00:00Z", "range": -57, "color": "#00ff00"},
            {"date": "2025-03-01T10:05:00Z", "range": 93}
        ]}"##;
        let samples = parse_upstream(body, ValueScale::Signed).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, utc(1, 10, 0));
        assert_eq!(samples[0].value, 21.5);
        assert_eq!(samples[1].value, 96.5);
    }

    #[test]
    fn test_parse_bare_list_skips_bad_items() {
        let body = r#"[
            {"date": "2025-03-01T10:00:00Z", "range": 10},
            {"date": "not a date", "range": 10},
            {"date": "2025-03-01T10:10:00Z"},
            {"range": 5},
            {"date": "2025-03-01T10:15:00", "range": 20}
        ]"#;
        let samples = parse_upstream(body, ValueScale::Percent).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, utc(1, 10, 15));
        assert_eq!(samples[1].value, 20.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_upstream("{\"error\": \"nope\"}", ValueScale::Signed).is_err());
        assert!(parse_upstream("<html>", ValueScale::Signed).is_err());
    }

    #[test]
    fn test_select_day_filters_sorts_and_dedups() {
        let tz = chrono_tz::Europe::Amsterdam;
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let samples = vec![
            RawSample::new(utc(1, 12, 0), 30.0),
            // 23:30 UTC on Feb 28 is already March 1 in Amsterdam.
            RawSample::new(Utc.with_ymd_and_hms(2025, 2, 28, 23, 30, 0).unwrap(), 10.0),
            RawSample::new(utc(1, 12, 0), 99.0),
            // 23:30 UTC on March 1 is March 2 locally.
            RawSample::new(utc(1, 23, 30), 50.0),
        ];

        let selected = select_day(samples, day, &tz);
        let values: Vec<f64> = selected.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![10.0, 30.0]);
    }

    #[test]
    fn test_local_days() {
        let tz = chrono_tz::Europe::Amsterdam;
        let (today, tomorrow) = local_days(utc(1, 23, 30), &tz);
        assert_eq!(today, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(tomorrow, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn test_series_file_into_input() {
        let file: SeriesFile = serde_json::from_str(
            r#"{"today": [{"timestamp": "2025-03-01T10:00:00Z", "value": 12}]}"#,
        )
        .unwrap();
        let input = file.into_input(&chrono_tz::UTC, utc(1, 11, 0));

        assert_eq!(input.today.day, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(input.today.samples.len(), 1);
        assert!(input.tomorrow.is_none());
        assert_eq!(input.fetched_at, utc(1, 11, 0));
    }

    #[test]
    fn test_series_file_spanning_two_days_rejects_today() {
        use crate::analysis::engine::{analyze, EngineConfig};
        use crate::error::AnalysisError;

        let file: SeriesFile = serde_json::from_str(
            r#"{"today": [
                {"timestamp": "2025-03-01T10:00:00Z", "value": 50},
                {"timestamp": "2025-03-02T10:00:00Z", "value": 5}
            ]}"#,
        )
        .unwrap();
        let config = EngineConfig {
            timezone: chrono_tz::UTC,
            top_moments: 3,
        };
        let input = file.into_input(&config.timezone, utc(2, 11, 0));
        let snapshot = analyze(&config, &input, utc(2, 11, 0));

        assert!(matches!(
            snapshot.today.error(),
            Some(AnalysisError::ForeignDay { timestamp, .. }) if *timestamp == utc(2, 10, 0)
        ));
        assert!(snapshot.current_value.is_none());
    }

    #[test]
    fn test_series_file_empty_tomorrow_is_present() {
        let file: SeriesFile = serde_json::from_str(r#"{"today": [], "tomorrow": []}"#).unwrap();
        let input = file.into_input(&chrono_tz::UTC, utc(4, 8, 0));

        assert_eq!(input.today.day, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        let tomorrow = input.tomorrow.unwrap();
        assert_eq!(tomorrow.day, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
        assert!(tomorrow.samples.is_empty());
    }

    #[test]
    fn test_load_series_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        std::fs::write(
            &path,
            r#"{"today": [{"timestamp": "2025-03-01T10:00:00Z", "value": 12}],
                "tomorrow": [{"timestamp": "2025-03-02T10:00:00Z", "value": 140}]}"#,
        )
        .unwrap();

        let file = tokio_test::block_on(load_series_file(&path)).unwrap();
        assert_eq!(file.today.len(), 1);
        assert_eq!(file.tomorrow.map(|t| t[0].value), Some(140.0));

        let missing = tokio_test::block_on(load_series_file(&dir.path().join("nope.json")));
        assert!(missing.is_err());
    }
}
