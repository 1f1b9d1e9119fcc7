//! Randomized jitter delays
//!
//! Varies the timing of the batch so runs do not start or step at fixed
//! intervals.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::info;

/// An inclusive delay range in seconds.
///
/// Values are signed on the wire; negative bounds are clamped to zero on
/// load. A range with `max < min` disables the delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayRange {
    pub min: i64,
    pub max: i64,
}

impl DelayRange {
    /// Clamp both bounds to be non-negative.
    pub fn clamped(self) -> Self {
        Self {
            min: self.min.max(0),
            max: self.max.max(0),
        }
    }

    /// Sample a delay from this range.
    pub fn sample_secs(&self) -> u64 {
        random_delay_secs(self.min, self.max)
    }
}

/// Uniformly sample a whole number of seconds from `[min, max]`, inclusive of
/// both bounds. Returns 0 (no delay) when `max <= 0` or `max < min`.
pub fn random_delay_secs(min: i64, max: i64) -> u64 {
    if max <= 0 || max < min {
        return 0;
    }
    let low = min.max(0);
    rand::thread_rng().gen_range(low..=max) as u64
}

/// Sample the range and sleep for that long, narrating the wait.
pub async fn jitter_sleep(range: DelayRange, what: &str) {
    let secs = range.sample_secs();
    if secs == 0 {
        return;
    }
    info!("{}: waiting {}s", what, secs);
    sleep(Duration::from_secs(secs)).await;
}
