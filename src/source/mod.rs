//! Load series retrieval.
//!
//! Produces one cycle's `RefreshInput` either from the upstream API or
//! from an offline JSON file.

pub mod client;
pub mod payload;

pub use client::LoadClient;
pub use payload::{load_series_file, ValueScale};

use crate::analysis::engine::RefreshInput;
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;

/// Where a refresh cycle gets its series from.
pub enum Source {
    Api(LoadClient),
    File(PathBuf),
}

impl Source {
    /// Retrieve the input for one refresh cycle.
    pub async fn fetch(&self, now: DateTime<Utc>, tz: &Tz) -> Result<RefreshInput> {
        match self {
            Source::Api(client) => client.fetch_cycle(now, tz).await,
            Source::File(path) => {
                let file = load_series_file(path).await?;
                Ok(file.into_input(tz, Utc::now()))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::Api(_) => "upstream API".to_string(),
            Source::File(path) => format!("file {}", path.display()),
        }
    }
}
