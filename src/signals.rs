//! Projection of a snapshot onto named signals.
//!
//! Each signal is what a home-automation entity would expose: a state and a
//! few attributes. Missing or invalid data renders as `Unavailable`, never as
//! zero, so numeric thresholds in automations do not misfire. Staleness is
//! judged here from the snapshot's age; the engine keeps serving whatever it
//! last published.

use crate::models::{AnalysisSnapshot, BestMoment, DayOutcome};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const GOOD_MOMENT: &str = "good_moment";
pub const CURRENT_VALUE: &str = "current_value";
pub const CURRENT_BAND: &str = "current_band";
pub const TODAY_BEST_MOMENT: &str = "today_best_moment";
pub const TODAY_AVERAGE: &str = "today_average";
pub const TODAY_GREEN_COUNT: &str = "today_green_count";
pub const TOMORROW_BEST_MOMENT: &str = "tomorrow_best_moment";
pub const TOMORROW_AVERAGE: &str = "tomorrow_average";
pub const LOAD_SERIES: &str = "load_series";

/// State of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SignalValue {
    Number(f64),
    Flag(bool),
    Timestamp(DateTime<Utc>),
    Count(usize),
    Text(String),
    Unavailable,
}

impl SignalValue {
    pub fn is_available(&self) -> bool {
        !matches!(self, SignalValue::Unavailable)
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Number(v) => write!(f, "{:.1}", v),
            SignalValue::Flag(true) => write!(f, "on"),
            SignalValue::Flag(false) => write!(f, "off"),
            SignalValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            SignalValue::Count(n) => write!(f, "{}", n),
            SignalValue::Text(s) => write!(f, "{}", s),
            SignalValue::Unavailable => write!(f, "unavailable"),
        }
    }
}

impl From<Option<f64>> for SignalValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SignalValue::Unavailable, SignalValue::Number)
    }
}

impl From<Option<BestMoment>> for SignalValue {
    fn from(moment: Option<BestMoment>) -> Self {
        moment.map_or(SignalValue::Unavailable, |m| SignalValue::Timestamp(m.timestamp))
    }
}

/// A named, consumer-facing signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub value: SignalValue,
    pub stale: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

impl Signal {
    fn new(name: &str, value: SignalValue) -> Self {
        Self {
            name: name.to_string(),
            value,
            stale: false,
            attributes: BTreeMap::new(),
        }
    }

    fn attr(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }
}

/// Whether a snapshot is too old to trust for "now" signals.
pub fn is_stale(snapshot: &AnalysisSnapshot, now: DateTime<Utc>, stale_after: Duration) -> bool {
    snapshot.age(now) > stale_after
}

/// Project the latest snapshot (if any) onto the named signals.
pub fn project(
    snapshot: Option<&AnalysisSnapshot>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Vec<Signal> {
    let Some(snapshot) = snapshot else {
        return [
            GOOD_MOMENT,
            CURRENT_VALUE,
            CURRENT_BAND,
            TODAY_BEST_MOMENT,
            TODAY_AVERAGE,
            TODAY_GREEN_COUNT,
            TOMORROW_BEST_MOMENT,
            TOMORROW_AVERAGE,
            LOAD_SERIES,
        ]
        .iter()
        .map(|name| Signal::new(name, SignalValue::Unavailable))
        .collect();
    };

    let stale = is_stale(snapshot, now, stale_after);
    let mut signals = current_signals(snapshot, stale);
    signals.extend(today_signals(&snapshot.today));
    signals.extend(tomorrow_signals(snapshot.tomorrow.as_ref()));
    signals.push(series_signal(snapshot));

    for signal in &mut signals {
        signal.stale = stale;
    }
    signals
}

fn current_signals(snapshot: &AnalysisSnapshot, stale: bool) -> Vec<Signal> {
    let (good, value, band) = if stale {
        (
            SignalValue::Unavailable,
            SignalValue::Unavailable,
            SignalValue::Unavailable,
        )
    } else {
        (
            SignalValue::Flag(snapshot.is_good_moment),
            SignalValue::from(snapshot.current_value),
            snapshot
                .current_band
                .map_or(SignalValue::Unavailable, |b| SignalValue::Text(b.to_string())),
        )
    };

    // A stale band must not leak through the attributes either.
    let attr_band = snapshot.current_band.filter(|_| !stale);
    let status = attr_band.map_or("unknown", |b| b.status());
    let color = attr_band.map_or("gray", |b| b.color());
    let is_good_moment = snapshot.is_good_moment && !stale;

    vec![
        Signal::new(GOOD_MOMENT, good)
            .attr("status", json!(status))
            .attr("color", json!(color)),
        Signal::new(CURRENT_VALUE, value)
            .attr("status", json!(status))
            .attr("color", json!(color))
            .attr("is_good_moment", json!(is_good_moment)),
        Signal::new(CURRENT_BAND, band).attr("color", json!(color)),
    ]
}

fn today_signals(today: &DayOutcome) -> Vec<Signal> {
    let analysis = today.analysis();
    let green = analysis.map_or(SignalValue::Unavailable, |a| {
        SignalValue::Count(a.green_hour_count)
    });

    let mut best = Signal::new(TODAY_BEST_MOMENT, today.best_moment().into());
    let mut average = Signal::new(TODAY_AVERAGE, today.average().into());
    let mut green_count = Signal::new(TODAY_GREEN_COUNT, green);

    if let Some(a) = analysis {
        best = best.attr("top_moments", json!(a.top_moments));
        average = average
            .attr("min", json!(a.min_value))
            .attr("max", json!(a.max_value));
        green_count = green_count
            .attr("orange", json!(a.band_counts.orange))
            .attr("red", json!(a.band_counts.red));
    }
    if let Some(error) = today.error() {
        let message = json!(error.to_string());
        best = best.attr("error", message.clone());
        average = average.attr("error", message.clone());
        green_count = green_count.attr("error", message);
    }

    vec![best, average, green_count]
}

fn tomorrow_signals(tomorrow: Option<&DayOutcome>) -> Vec<Signal> {
    let available = tomorrow
        .and_then(|t| t.analysis())
        .map_or(false, |a| a.sample_count > 0);

    let mut best = Signal::new(
        TOMORROW_BEST_MOMENT,
        tomorrow.and_then(|t| t.best_moment()).into(),
    )
    .attr("data_available", json!(available));
    let mut average = Signal::new(TOMORROW_AVERAGE, tomorrow.and_then(|t| t.average()).into())
        .attr("data_available", json!(available));

    if let Some(a) = tomorrow.and_then(|t| t.analysis()) {
        best = best.attr("top_moments", json!(a.top_moments));
        average = average
            .attr("min", json!(a.min_value))
            .attr("max", json!(a.max_value));
    }
    if let Some(error) = tomorrow.and_then(|t| t.error()) {
        best = best.attr("error", json!(error.to_string()));
        average = average.attr("error", json!(error.to_string()));
    }

    vec![best, average]
}

fn series_signal(snapshot: &AnalysisSnapshot) -> Signal {
    let today = &snapshot.today;
    let tomorrow = snapshot.tomorrow.as_ref();

    Signal::new(LOAD_SERIES, SignalValue::Timestamp(snapshot.computed_at))
        .attr("hourly_today", json!(today.hourly()))
        .attr(
            "hourly_tomorrow",
            json!(tomorrow.map(|t| t.hourly()).unwrap_or(&[])),
        )
        .attr("series_today", json!(today.series().map(|s| s.samples())))
        .attr(
            "series_tomorrow",
            json!(tomorrow.and_then(|t| t.series()).map(|s| s.samples())),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::engine::{analyze, DayInput, EngineConfig, RefreshInput};
    use crate::models::RawSample;
    use chrono::{NaiveDate, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn snapshot(today: &[f64], tomorrow: Option<&[f64]>) -> AnalysisSnapshot {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let raw = |start: DateTime<Utc>, values: &[f64]| -> Vec<RawSample> {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| RawSample::new(start + Duration::hours(i as i64), *v))
                .collect()
        };
        let next_day = day.succ_opt().unwrap();
        let input = RefreshInput {
            today: DayInput::new(day, raw(at(0), today)),
            tomorrow: tomorrow.map(|v| DayInput::new(next_day, raw(at(0) + Duration::days(1), v))),
            fetched_at: at(0),
        };
        let config = EngineConfig {
            timezone: chrono_tz::UTC,
            top_moments: 3,
        };
        analyze(&config, &input, at(1))
    }

    fn find<'a>(signals: &'a [Signal], name: &str) -> &'a Signal {
        signals.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_no_snapshot_is_all_unavailable() {
        let signals = project(None, Utc::now(), Duration::minutes(60));
        assert_eq!(signals.len(), 9);
        assert!(signals.iter().all(|s| !s.value.is_available()));
    }

    #[test]
    fn test_fresh_snapshot_signals() {
        let snap = snapshot(&[50.0, 20.0, 20.0, 80.0], None);
        let signals = project(Some(&snap), snap.computed_at, Duration::minutes(60));

        assert_eq!(find(&signals, GOOD_MOMENT).value, SignalValue::Flag(true));
        assert_eq!(find(&signals, CURRENT_VALUE).value, SignalValue::Number(20.0));
        assert_eq!(
            find(&signals, CURRENT_BAND).value,
            SignalValue::Text("Green".to_string())
        );
        assert_eq!(find(&signals, TODAY_AVERAGE).value, SignalValue::Number(42.5));
        assert_eq!(find(&signals, TODAY_GREEN_COUNT).value, SignalValue::Count(2));
        assert_eq!(
            find(&signals, TODAY_BEST_MOMENT).value,
            SignalValue::Timestamp(at(1))
        );
        assert!(signals.iter().all(|s| !s.stale));
    }

    #[test]
    fn test_absent_tomorrow_is_unavailable() {
        let snap = snapshot(&[10.0], None);
        let signals = project(Some(&snap), snap.computed_at, Duration::minutes(60));

        let best = find(&signals, TOMORROW_BEST_MOMENT);
        assert_eq!(best.value, SignalValue::Unavailable);
        assert_eq!(best.attributes.get("data_available"), Some(&json!(false)));
        assert_eq!(
            find(&signals, TOMORROW_AVERAGE).value,
            SignalValue::Unavailable
        );
    }

    #[test]
    fn test_invalid_tomorrow_carries_error() {
        let snap = snapshot(&[10.0], Some(&[10.0, 250.0]));
        let signals = project(Some(&snap), snap.computed_at, Duration::minutes(60));

        let avg = find(&signals, TOMORROW_AVERAGE);
        assert_eq!(avg.value, SignalValue::Unavailable);
        assert!(avg.attributes.contains_key("error"));
        assert_eq!(find(&signals, TODAY_AVERAGE).value, SignalValue::Number(10.0));
    }

    #[test]
    fn test_stale_snapshot_hides_current_signals() {
        let snap = snapshot(&[10.0, 10.0], Some(&[30.0]));
        let later = snap.computed_at + Duration::minutes(61);
        let signals = project(Some(&snap), later, Duration::minutes(60));

        assert!(signals.iter().all(|s| s.stale));
        assert_eq!(find(&signals, GOOD_MOMENT).value, SignalValue::Unavailable);
        assert_eq!(find(&signals, CURRENT_VALUE).value, SignalValue::Unavailable);
        assert_eq!(find(&signals, TOMORROW_AVERAGE).value, SignalValue::Number(30.0));

        let good = find(&signals, GOOD_MOMENT);
        assert_eq!(good.attributes.get("status"), Some(&json!("unknown")));
        assert_eq!(good.attributes.get("color"), Some(&json!("gray")));
        let current = find(&signals, CURRENT_VALUE);
        assert_eq!(current.attributes.get("is_good_moment"), Some(&json!(false)));
        assert_eq!(current.attributes.get("status"), Some(&json!("unknown")));
        assert_eq!(
            find(&signals, CURRENT_BAND).attributes.get("color"),
            Some(&json!("gray"))
        );
    }

    #[test]
    fn test_signal_value_display() {
        assert_eq!(SignalValue::Flag(true).to_string(), "on");
        assert_eq!(SignalValue::Number(21.456).to_string(), "21.5");
        assert_eq!(SignalValue::Unavailable.to_string(), "unavailable");
    }

    #[test]
    fn test_series_signal_has_hourly_profile() {
        let snap = snapshot(&[10.0, 20.0], None);
        let signals = project(Some(&snap), snap.computed_at, Duration::minutes(60));

        let series = find(&signals, LOAD_SERIES);
        let hourly = series.attributes.get("hourly_today").unwrap();
        assert_eq!(hourly.as_array().map(|a| a.len()), Some(24));
        assert_eq!(series.attributes.get("hourly_tomorrow"), Some(&json!([])));
    }
}
