//! Markdown and JSON report generation.
//!
//! This module renders a snapshot and its projected signals for people
//! (Markdown) and for other programs (JSON).

use crate::models::{AnalysisSnapshot, DayAnalysis, DayOutcome, LoadBand};
use crate::signals::Signal;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Context printed alongside the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Where the series came from.
    pub source: String,
    /// Zone used for calendar days and displayed times.
    pub timezone: String,
    /// Instant "now" was evaluated at.
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    snapshot: &'a AnalysisSnapshot,
    signals: &'a [Signal],
}

/// Generate a pretty-printed JSON report.
pub fn generate_json_report(
    metadata: &ReportMetadata,
    snapshot: &AnalysisSnapshot,
    signals: &[Signal],
) -> Result<String> {
    let report = JsonReport {
        metadata,
        snapshot,
        signals,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize report to JSON")
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(
    metadata: &ReportMetadata,
    snapshot: &AnalysisSnapshot,
    signals: &[Signal],
    tz: &Tz,
) -> String {
    let mut output = String::new();

    output.push_str("# Eklok Grid Load Report\n\n");
    output.push_str(&generate_metadata_section(metadata, snapshot, tz));
    output.push_str(&generate_current_section(snapshot));
    output.push_str(&generate_day_section("Today", Some(&snapshot.today), tz));
    output.push_str(&generate_day_section("Tomorrow", snapshot.tomorrow.as_ref(), tz));
    output.push_str(&generate_signals_section(signals));

    output
}

fn local(ts: DateTime<Utc>, tz: &Tz) -> String {
    ts.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "unavailable".to_string(), |v| format!("{:.1}", v))
}

/// Generate the metadata section.
fn generate_metadata_section(
    metadata: &ReportMetadata,
    snapshot: &AnalysisSnapshot,
    tz: &Tz,
) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!("- **Timezone:** {}\n", metadata.timezone));
    section.push_str(&format!(
        "- **Evaluated At:** {}\n",
        local(metadata.evaluated_at, tz)
    ));
    section.push_str(&format!(
        "- **Fetched At:** {}\n",
        local(snapshot.fetched_at, tz)
    ));
    section.push_str(&format!(
        "- **Computed At:** {}\n\n",
        snapshot.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

/// Generate the current status section.
fn generate_current_section(snapshot: &AnalysisSnapshot) -> String {
    let mut section = String::new();

    section.push_str("## Current Status\n\n");
    match snapshot.current_band {
        Some(band) => {
            section.push_str(&format!(
                "- **Band:** {} {} ({})\n",
                band.emoji(),
                band,
                band.status()
            ));
        }
        None => section.push_str("- **Band:** unavailable\n"),
    }
    section.push_str(&format!(
        "- **Value:** {}\n",
        number(snapshot.current_value)
    ));
    section.push_str(&format!(
        "- **Good Moment:** {}\n\n",
        if snapshot.is_good_moment { "yes" } else { "no" }
    ));

    section
}

/// Generate the section for one day.
fn generate_day_section(title: &str, outcome: Option<&DayOutcome>, tz: &Tz) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => {
            section.push_str("Not published yet.\n\n");
            return section;
        }
    };

    match outcome {
        DayOutcome::Invalid { error } => {
            section.push_str(&format!("⚠️ Data rejected: {}\n\n", error));
        }
        DayOutcome::Ready {
            series,
            analysis,
            hourly,
        } => {
            section.push_str(&format!("- **Date:** {}\n", series.day()));
            if series.is_empty() {
                section.push_str("- **Samples:** none\n\n");
                return section;
            }
            section.push_str(&generate_statistics(analysis, tz));
            section.push_str(&generate_band_table(analysis));
            section.push_str(&generate_top_moments(analysis, tz));

            section.push_str("### Hourly Profile\n\n");
            section.push_str("| Hour | Average | Band |\n");
            section.push_str("|:---:|:---:|:---|\n");
            for bucket in hourly.iter().filter(|b| b.samples > 0) {
                let band = bucket
                    .band
                    .map_or_else(String::new, |b| format!("{} {}", b.emoji(), b));
                section.push_str(&format!(
                    "| {:02}:00 | {} | {} |\n",
                    bucket.hour,
                    number(bucket.average),
                    band
                ));
            }
            section.push('\n');
        }
    }

    section
}

fn generate_statistics(analysis: &DayAnalysis, tz: &Tz) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Samples:** {}\n", analysis.sample_count));
    section.push_str(&format!("- **Average:** {}\n", number(analysis.average)));
    section.push_str(&format!(
        "- **Min / Max:** {} / {}\n",
        number(analysis.min_value),
        number(analysis.max_value)
    ));
    if let Some(best) = analysis.best_moment {
        section.push_str(&format!(
            "- **Best Moment:** {} ({:.1})\n",
            local(best.timestamp, tz),
            best.value
        ));
    }
    section.push_str(&format!(
        "- **Green Samples:** {}\n\n",
        analysis.green_hour_count
    ));

    section
}

fn generate_band_table(analysis: &DayAnalysis) -> String {
    let bands = [LoadBand::Green, LoadBand::Orange, LoadBand::Red];
    let mut section = String::new();

    for band in bands {
        section.push_str(&format!("| {} {} ", band.emoji(), band));
    }
    section.push_str("| **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    for band in bands {
        section.push_str(&format!("| {} ", analysis.band_counts.get(band)));
    }
    section.push_str(&format!("| **{}** |\n\n", analysis.band_counts.total()));

    section
}

fn generate_top_moments(analysis: &DayAnalysis, tz: &Tz) -> String {
    if analysis.top_moments.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("### Best Moments\n\n");
    for (i, moment) in analysis.top_moments.iter().enumerate() {
        section.push_str(&format!(
            "{}. {} ({:.1})\n",
            i + 1,
            local(moment.timestamp, tz),
            moment.value
        ));
    }
    section.push('\n');

    section
}

/// Generate the signals table.
fn generate_signals_section(signals: &[Signal]) -> String {
    let mut section = String::new();

    section.push_str("## Signals\n\n");
    section.push_str("| Signal | State | Stale |\n");
    section.push_str("|:---|:---|:---:|\n");
    for signal in signals {
        let state = if signal.value.is_available() {
            signal.value.to_string()
        } else {
            format!("_{}_", signal.value)
        };
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            signal.name,
            state,
            if signal.stale { "yes" } else { "no" }
        ));
    }
    section.push('\n');

    section
}
