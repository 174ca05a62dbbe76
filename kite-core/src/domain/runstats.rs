//! Run statistics

use serde::{Deserialize, Serialize};
use std::ops::Add;

use crate::record::JsonRecord;

/// Wall-clock duration of a run
///
/// Stored as seconds once known. Before that a string placeholder may be
/// carried (for example while the program output has not been parsed yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunDuration {
    Seconds(f64),
    Pending(String),
}

impl RunDuration {
    /// Placeholder used until the duration is measured
    pub fn pending() -> Self {
        RunDuration::Pending("pending".to_string())
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            RunDuration::Seconds(s) => Some(*s),
            RunDuration::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RunDuration::Pending(_))
    }
}

impl Default for RunDuration {
    fn default() -> Self {
        RunDuration::Seconds(0.0)
    }
}

/// Statistics describing where and how long a job ran
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    pub host: String,
    pub cluster: String,
    pub duration: RunDuration,
    pub ncores: u32,
    pub ngpus: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkgversion: Option<String>,
}

impl RunStats {
    /// Replaces the duration with `seconds` rounded to 6 decimal places
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = RunDuration::Seconds(round_seconds(seconds));
    }
}

/// Rounds a duration to microsecond precision
pub fn round_seconds(seconds: f64) -> f64 {
    (seconds * 1e6).round() / 1e6
}

/// Combining two runs sums their durations and keeps every other field of
/// the right-hand side. A placeholder counts as zero unless both sides are
/// placeholders.
impl Add for RunStats {
    type Output = RunStats;

    fn add(self, other: RunStats) -> RunStats {
        let duration = match (self.duration.seconds(), other.duration.seconds()) {
            (None, None) => other.duration.clone(),
            (a, b) => RunDuration::Seconds(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };

        RunStats { duration, ..other }
    }
}

impl JsonRecord for RunStats {
    const FILE_NAME: &'static str = "runstats.json";
}
