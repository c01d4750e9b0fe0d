//! Best-moment selection within a day's series.

use crate::models::{BestMoment, LoadSeries};

/// Find the sample with the lowest value, earliest on ties.
///
/// Single pass: a later sample only replaces the running best when it is
/// strictly lower, which keeps the earliest timestamp among equal minima.
pub fn find_best_moment(series: &LoadSeries) -> Option<BestMoment> {
    let mut samples = series.iter();
    let mut best = samples.next()?;

    for sample in samples {
        if sample.value() < best.value() {
            best = sample;
        }
    }

    Some(BestMoment::from(best))
}

/// The `n` lowest samples, ordered by value then timestamp.
pub fn rank_moments(series: &LoadSeries, n: usize) -> Vec<BestMoment> {
    let mut ranked: Vec<BestMoment> = series.iter().map(BestMoment::from).collect();

    // The series is already in timestamp order, so a stable sort on value
    // keeps equal values earliest-first.
    ranked.sort_by(|a, b| a.value.total_cmp(&b.value));
    ranked.truncate(n);

    ranked
}
