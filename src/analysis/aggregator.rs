//! Per-day aggregation and statistics.
//!
//! This module reduces a day's series to its summary: band counts, mean,
//! extremes, best moment and the ranked lowest moments, plus an hourly
//! profile for charting.

use crate::analysis::classifier::classify;
use crate::analysis::window::{find_best_moment, rank_moments};
use crate::models::{BandCounts, DayAnalysis, HourlyBucket, LoadSeries};
use chrono::Timelike;
use chrono_tz::Tz;

/// Number of ranked moments kept when no explicit count is given.
pub const DEFAULT_TOP_MOMENTS: usize = 5;

/// Summarize a day's series, keeping the `top_moments` lowest samples.
pub fn aggregate(series: &LoadSeries, top_moments: usize) -> DayAnalysis {
    let mut band_counts = BandCounts::default();
    let mut sum = 0.0;
    let mut min_value: Option<f64> = None;
    let mut max_value: Option<f64> = None;

    for sample in series.iter() {
        let value = sample.value();
        band_counts.record(sample.band());
        sum += value;
        min_value = Some(min_value.map_or(value, |m| m.min(value)));
        max_value = Some(max_value.map_or(value, |m| m.max(value)));
    }

    let sample_count = series.len();
    let average = if sample_count > 0 {
        Some(sum / sample_count as f64)
    } else {
        None
    };

    DayAnalysis {
        best_moment: find_best_moment(series),
        green_hour_count: band_counts.green,
        average,
        band_counts,
        sample_count,
        min_value,
        max_value,
        top_moments: rank_moments(series, top_moments),
    }
}

/// Mean load per local clock hour, always 24 buckets.
///
/// Hours without samples have no average and no band.
pub fn hourly_profile(series: &LoadSeries, tz: &Tz) -> Vec<HourlyBucket> {
    let mut sums = [0.0_f64; 24];
    let mut counts = [0_usize; 24];

    for sample in series.iter() {
        let hour = sample.timestamp().with_timezone(tz).hour() as usize;
        sums[hour] += sample.value();
        counts[hour] += 1;
    }

    (0..24)
        .map(|hour| {
            let samples = counts[hour];
            let average = if samples > 0 {
                Some(sums[hour] / samples as f64)
            } else {
                None
            };
            HourlyBucket {
                hour: hour as u32,
                average,
                // The mean of in-range values stays in range.
                band: average.and_then(|avg| classify(avg).ok()),
                samples,
            }
        })
        .collect()
}
