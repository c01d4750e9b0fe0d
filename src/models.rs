//! Data models for the load-series analysis.
//!
//! This module contains the core data structures: validated samples and
//! per-day series on the input side, and the derived per-day analysis and
//! published snapshot on the output side.

use crate::analysis::classifier::classify;
use crate::error::AnalysisError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of grid-load intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBand {
    /// Low load - a good moment for heavy consumption
    Green,
    /// Moderate load
    Orange,
    /// Peak load
    Red,
}

impl fmt::Display for LoadBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBand::Green => write!(f, "Green"),
            LoadBand::Orange => write!(f, "Orange"),
            LoadBand::Red => write!(f, "Red"),
        }
    }
}

impl LoadBand {
    /// Status word used by dashboards.
    pub fn status(&self) -> &'static str {
        match self {
            LoadBand::Green => "good",
            LoadBand::Orange => "moderate",
            LoadBand::Red => "bad",
        }
    }

    /// Display color of the band.
    pub fn color(&self) -> &'static str {
        match self {
            LoadBand::Green => "green",
            LoadBand::Orange => "orange",
            LoadBand::Red => "red",
        }
    }

    /// Returns an emoji representation of the band.
    pub fn emoji(&self) -> &'static str {
        match self {
            LoadBand::Green => "🟢",
            LoadBand::Orange => "🟠",
            LoadBand::Red => "🔴",
        }
    }
}

/// An unvalidated `(timestamp, value)` pair as it arrives at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl RawSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A validated load sample. The value is guaranteed to lie in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSample")]
pub struct LoadSample {
    timestamp: DateTime<Utc>,
    value: f64,
    band: LoadBand,
}

impl LoadSample {
    /// Validate and classify a sample.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Result<Self, AnalysisError> {
        let band = classify(value).map_err(|e| e.at(timestamp))?;
        Ok(Self {
            timestamp,
            value,
            band,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn band(&self) -> LoadBand {
        self.band
    }
}

impl TryFrom<RawSample> for LoadSample {
    type Error = AnalysisError;

    fn try_from(raw: RawSample) -> Result<Self, Self::Error> {
        LoadSample::new(raw.timestamp, raw.value)
    }
}

/// Samples for one local calendar day, strictly ascending by timestamp.
///
/// An empty series is valid and means "no data for this day". Only built
/// through validation, so it is serialized but never deserialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSeries {
    day: NaiveDate,
    samples: Vec<LoadSample>,
}

impl LoadSeries {
    /// Build a series from validated samples.
    ///
    /// Every sample must fall on `day` in `tz`; disorder and duplicates are rejected.
    pub fn new(day: NaiveDate, samples: Vec<LoadSample>, tz: &Tz) -> Result<Self, AnalysisError> {
        if let Some(foreign) = samples
            .iter()
            .find(|s| s.timestamp.with_timezone(tz).date_naive() != day)
        {
            return Err(AnalysisError::ForeignDay {
                timestamp: foreign.timestamp,
                day,
            });
        }

        for pair in samples.windows(2) {
            let (prev, next) = (pair[0].timestamp, pair[1].timestamp);
            if next == prev {
                return Err(AnalysisError::DuplicateTimestamp { timestamp: next });
            }
            if next < prev {
                return Err(AnalysisError::UnorderedSeries { timestamp: next });
            }
        }

        Ok(Self { day, samples })
    }

    /// Validate raw boundary samples into a series.
    ///
    /// The first invalid value fails the whole series; nothing is clamped or dropped.
    pub fn from_raw(day: NaiveDate, raw: &[RawSample], tz: &Tz) -> Result<Self, AnalysisError> {
        let samples = raw
            .iter()
            .map(|r| LoadSample::new(r.timestamp, r.value))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(day, samples, tz)
    }

    /// A series with no samples.
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            samples: Vec::new(),
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn samples(&self) -> &[LoadSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LoadSample> {
        self.samples.iter()
    }

    /// The most recent sample whose timestamp is not after `now`.
    pub fn latest_at(&self, now: DateTime<Utc>) -> Option<&LoadSample> {
        let idx = self.samples.partition_point(|s| s.timestamp <= now);
        idx.checked_sub(1).map(|i| &self.samples[i])
    }
}

/// The lowest-load moment of a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestMoment {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl From<&LoadSample> for BestMoment {
    fn from(sample: &LoadSample) -> Self {
        Self {
            timestamp: sample.timestamp(),
            value: sample.value(),
        }
    }
}

/// Number of samples per band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub green: usize,
    pub orange: usize,
    pub red: usize,
}

impl BandCounts {
    pub fn get(&self, band: LoadBand) -> usize {
        match band {
            LoadBand::Green => self.green,
            LoadBand::Orange => self.orange,
            LoadBand::Red => self.red,
        }
    }

    pub fn record(&mut self, band: LoadBand) {
        match band {
            LoadBand::Green => self.green += 1,
            LoadBand::Orange => self.orange += 1,
            LoadBand::Red => self.red += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.green + self.orange + self.red
    }
}

/// Derived statistics for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAnalysis {
    /// Lowest sample, earliest on ties. Absent for an empty series.
    pub best_moment: Option<BestMoment>,
    /// Number of Green samples (hours, for an hourly series).
    pub green_hour_count: usize,
    /// Mean of all sample values. Absent for an empty series.
    pub average: Option<f64>,
    pub band_counts: BandCounts,
    pub sample_count: usize,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Lowest samples, value ascending then timestamp ascending.
    pub top_moments: Vec<BestMoment>,
}

/// Mean load of one local clock hour, for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: u32,
    pub average: Option<f64>,
    pub band: Option<LoadBand>,
    pub samples: usize,
}

/// Result of analysing one day: either a full analysis or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayOutcome {
    Ready {
        series: LoadSeries,
        analysis: DayAnalysis,
        hourly: Vec<HourlyBucket>,
    },
    Invalid {
        error: AnalysisError,
    },
}

impl DayOutcome {
    /// The analysis, if the day's data was valid.
    pub fn analysis(&self) -> Option<&DayAnalysis> {
        match self {
            DayOutcome::Ready { analysis, .. } => Some(analysis),
            DayOutcome::Invalid { .. } => None,
        }
    }

    pub fn series(&self) -> Option<&LoadSeries> {
        match self {
            DayOutcome::Ready { series, .. } => Some(series),
            DayOutcome::Invalid { .. } => None,
        }
    }

    pub fn hourly(&self) -> &[HourlyBucket] {
        match self {
            DayOutcome::Ready { hourly, .. } => hourly,
            DayOutcome::Invalid { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            DayOutcome::Ready { .. } => None,
            DayOutcome::Invalid { error } => Some(error),
        }
    }

    /// Best moment, when the day is valid and non-empty.
    pub fn best_moment(&self) -> Option<BestMoment> {
        self.analysis().and_then(|a| a.best_moment)
    }

    /// Average, when the day is valid and non-empty.
    pub fn average(&self) -> Option<f64> {
        self.analysis().and_then(|a| a.average)
    }
}

/// One complete, immutable set of derived signals from a refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    pub current_value: Option<f64>,
    pub current_band: Option<LoadBand>,
    pub is_good_moment: bool,
    pub today: DayOutcome,
    /// Absent when no tomorrow series was supplied at all.
    pub tomorrow: Option<DayOutcome>,
    /// When the inputs of this snapshot were fetched.
    pub fetched_at: DateTime<Utc>,
    pub computed_at: DateTime<Utc>,
}

impl AnalysisSnapshot {
    /// Compare every derived field, ignoring `computed_at`.
    pub fn same_signals(&self, other: &AnalysisSnapshot) -> bool {
        self.current_value == other.current_value
            && self.current_band == other.current_band
            && self.is_good_moment == other.is_good_moment
            && self.today == other.today
            && self.tomorrow == other.tomorrow
    }

    /// Age of the snapshot at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.computed_at)
    }
}
