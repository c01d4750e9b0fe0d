//! Error taxonomy for load-series analysis.
//!
//! These errors describe why a single day's analysis could not be produced.
//! They travel inside the published snapshot, so they are cloneable and
//! serializable. Everything outside the analysis core uses `anyhow`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a day's series is rejected.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    /// A sample value lies outside [0, 100] (or is not a number).
    #[error("invalid sample at {timestamp}: value {value} is outside [0, 100]")]
    InvalidSample {
        timestamp: DateTime<Utc>,
        value: f64,
    },

    /// A sample is earlier than the one before it.
    #[error("series is not ordered: sample at {timestamp} follows a later sample")]
    UnorderedSeries { timestamp: DateTime<Utc> },

    /// Two samples share a timestamp.
    #[error("duplicate sample timestamp {timestamp}")]
    DuplicateTimestamp { timestamp: DateTime<Utc> },

    /// A sample falls on another local calendar day than its series.
    #[error("sample at {timestamp} does not belong to {day}")]
    ForeignDay {
        timestamp: DateTime<Utc>,
        day: NaiveDate,
    },
}

/// A bare value outside the classifiable range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("value {0} is outside [0, 100]")]
pub struct ValueOutOfRange(pub f64);

impl ValueOutOfRange {
    /// Attach the timestamp of the offending sample.
    pub fn at(self, timestamp: DateTime<Utc>) -> AnalysisError {
        AnalysisError::InvalidSample {
            timestamp,
            value: self.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_messages() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let err = AnalysisError::InvalidSample {
            timestamp: ts,
            value: 120.0,
        };
        assert!(err.to_string().contains("outside [0, 100]"));
        assert!(err.to_string().contains("120"));

        let err = AnalysisError::DuplicateTimestamp { timestamp: ts };
        assert!(err.to_string().starts_with("duplicate sample timestamp"));

        let err = AnalysisError::ForeignDay {
            timestamp: ts,
            day: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        };
        assert!(err.to_string().ends_with("does not belong to 2025-03-02"));
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let err = AnalysisError::UnorderedSeries { timestamp: ts };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unordered_series");
    }

    #[test]
    fn test_out_of_range_at_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 13, 0, 0).unwrap();
        let err = ValueOutOfRange(-1.0).at(ts);
        assert_eq!(
            err,
            AnalysisError::InvalidSample {
                timestamp: ts,
                value: -1.0
            }
        );
    }
}
