//! Load-series analysis.
//!
//! Classification, best-moment selection, per-day aggregation and the
//! engine that turns a refresh cycle's input into a published snapshot.

pub mod aggregator;
pub mod classifier;
pub mod engine;
pub mod window;

pub use engine::{AnalysisEngine, EngineConfig};
