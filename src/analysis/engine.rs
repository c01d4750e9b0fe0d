//! Refresh orchestration and snapshot publication.
//!
//! The engine validates each day independently, derives the per-day
//! analysis and the current-moment signals, and publishes the result as a
//! single immutable snapshot. Readers always get a whole snapshot: the held
//! reference is swapped under a write lock and handed out as an `Arc`.

use crate::analysis::aggregator::{aggregate, hourly_profile, DEFAULT_TOP_MOMENTS};
use crate::analysis::classifier::is_good_band;
use crate::models::{AnalysisSnapshot, DayOutcome, LoadSeries, RawSample};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Zone whose calendar days and clock hours the series follow.
    pub timezone: Tz,
    /// How many ranked moments each day keeps.
    pub top_moments: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Amsterdam,
            top_moments: DEFAULT_TOP_MOMENTS,
        }
    }
}

/// Raw samples for one calendar day, as delivered by the data source.
#[derive(Debug, Clone, PartialEq)]
pub struct DayInput {
    pub day: NaiveDate,
    pub samples: Vec<RawSample>,
}

impl DayInput {
    pub fn new(day: NaiveDate, samples: Vec<RawSample>) -> Self {
        Self { day, samples }
    }
}

/// Everything one refresh cycle consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshInput {
    pub today: DayInput,
    /// `None` when tomorrow has not been published.
    pub tomorrow: Option<DayInput>,
    pub fetched_at: DateTime<Utc>,
}

/// Holds the latest snapshot and produces new ones.
pub struct AnalysisEngine {
    config: EngineConfig,
    current: RwLock<Option<Arc<AnalysisSnapshot>>>,
    refresh_gate: Mutex<()>,
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The latest published snapshot, if any refresh has completed.
    pub fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.current.read().clone()
    }

    /// Run one refresh cycle and publish its snapshot.
    ///
    /// Calls are serialized. Input fetched earlier than the published
    /// snapshot's input is dropped and the published snapshot is returned.
    pub fn refresh(&self, input: &RefreshInput, now: DateTime<Utc>) -> Arc<AnalysisSnapshot> {
        let _gate = self.refresh_gate.lock();

        let previous = self.snapshot();
        if let Some(ref current) = previous {
            if input.fetched_at < current.fetched_at {
                warn!(
                    "Dropping refresh fetched at {} (published snapshot was fetched at {})",
                    input.fetched_at, current.fetched_at
                );
                return Arc::clone(current);
            }
        }

        let snapshot = Arc::new(analyze(&self.config, input, now));
        if previous.map_or(false, |p| p.same_signals(&snapshot)) {
            debug!("Signals unchanged since the previous refresh");
        }
        *self.current.write() = Some(Arc::clone(&snapshot));

        info!(
            "Published snapshot: current={} band={} good_moment={} tomorrow={}",
            snapshot
                .current_value
                .map_or_else(|| "unavailable".to_string(), |v| format!("{:.1}", v)),
            snapshot
                .current_band
                .map_or_else(|| "unavailable".to_string(), |b| b.to_string()),
            snapshot.is_good_moment,
            if snapshot.tomorrow.is_some() {
                "present"
            } else {
                "absent"
            },
        );

        snapshot
    }
}

/// Derive a snapshot from one cycle's input without publishing it.
pub fn analyze(
    config: &EngineConfig,
    input: &RefreshInput,
    now: DateTime<Utc>,
) -> AnalysisSnapshot {
    let today = analyze_day(config, &input.today, "today");
    let tomorrow = input
        .tomorrow
        .as_ref()
        .map(|day| analyze_day(config, day, "tomorrow"));

    let current = today.series().and_then(|s| s.latest_at(now));
    let current_value = current.map(|s| s.value());
    let current_band = current.map(|s| s.band());

    AnalysisSnapshot {
        current_value,
        current_band,
        is_good_moment: current_band.map_or(false, is_good_band),
        today,
        tomorrow,
        fetched_at: input.fetched_at,
        computed_at: Utc::now(),
    }
}

/// Validate and summarize one day. A failure stays confined to this day.
fn analyze_day(config: &EngineConfig, input: &DayInput, label: &str) -> DayOutcome {
    match LoadSeries::from_raw(input.day, &input.samples, &config.timezone) {
        Ok(series) => {
            let analysis = aggregate(&series, config.top_moments);
            let hourly = hourly_profile(&series, &config.timezone);
            debug!(
                "{} ({}): {} samples, best={:?}, average={:?}",
                label,
                input.day,
                analysis.sample_count,
                analysis.best_moment,
                analysis.average
            );
            DayOutcome::Ready {
                series,
                analysis,
                hourly,
            }
        }
        Err(error) => {
            warn!("{} ({}) rejected: {}", label, input.day, error);
            DayOutcome::Invalid { error }
        }
    }
}
