//! Transaction-rate metrics.
//!
//! The host calls [`crate::RpcFrontend::tick`] periodically; each tick
//! feeds the elapsed interval and the number of dispatched calls into this
//! tracker. Samples are kept in a bounded window.

use std::collections::VecDeque;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Number of rate samples retained.
const SAMPLE_WINDOW: usize = 100;

/// Point-in-time view of transaction rates, served by `GET_METRICS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricsSnapshot {
    /// Rate observed over the most recent tick, in calls per second.
    pub tx_rate: f64,
    /// Lowest rate in the window.
    pub min_rate: f64,
    /// Highest rate in the window.
    pub max_rate: f64,
    /// Mean rate over the window.
    pub average_rate: f64,
    /// Number of samples in the window.
    pub samples: usize,
}

/// Bounded-window tracker of per-tick transaction rates.
#[derive(Debug, Default)]
pub struct Metrics {
    rates: VecDeque<f64>,
}

impl Metrics {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick interval. Zero-length intervals are ignored.
    pub fn track_tx_rates(&mut self, elapsed: Duration, tx_count: u64) {
        let elapsed_ms = elapsed.as_millis();
        if elapsed_ms == 0 {
            return;
        }
        let rate = tx_count as f64 * 1000.0 / elapsed_ms as f64;
        if self.rates.len() == SAMPLE_WINDOW {
            self.rates.pop_front();
        }
        self.rates.push_back(rate);
    }

    /// Snapshot of the current window.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.rates.len();
        if samples == 0 {
            return MetricsSnapshot {
                tx_rate: 0.0,
                min_rate: 0.0,
                max_rate: 0.0,
                average_rate: 0.0,
                samples: 0,
            };
        }
        let mut min_rate = f64::INFINITY;
        let mut max_rate = 0.0f64;
        let mut total = 0.0;
        for rate in &self.rates {
            min_rate = min_rate.min(*rate);
            max_rate = max_rate.max(*rate);
            total += rate;
        }
        MetricsSnapshot {
            tx_rate: *self.rates.back().unwrap_or(&0.0),
            min_rate,
            max_rate,
            average_rate: total / samples as f64,
            samples,
        }
    }
}
