//! Progress reports derived from transporter byte samples.

use serde::Serialize;
use std::time::Instant;

use crate::humanize::{format_bytes, format_seconds};

/// Byte counters reported by a transporter while the request body is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSample {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

/// Snapshot handed to the `progress` hook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub elapsed_seconds: f64,
    pub elapsed_human: String,
    /// Completed share in `[0, 1]`
    pub fraction: f64,
    pub percent: String,
    pub bytes_sent: u64,
    pub bytes_sent_human: String,
    pub bytes_total: u64,
    pub bytes_total_human: String,
    pub rate_bytes_per_sec: f64,
    pub rate_human: String,
    /// Whole seconds remaining, `-1` until any progress has been made
    pub eta_seconds_raw: i64,
    pub eta_human: String,
}

/// Time source for upload timing
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressCalculator {
    eta_quantum: Option<u64>,
}

impl ProgressCalculator {
    /// `eta_quantum_secs` of zero disables ETA quantization
    pub fn new(eta_quantum_secs: u64) -> Self {
        Self {
            eta_quantum: (eta_quantum_secs > 0).then_some(eta_quantum_secs),
        }
    }

    pub fn compute(
        &self,
        sample: ProgressSample,
        started_at: Instant,
        now: Instant,
    ) -> ProgressReport {
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();

        let fraction = if sample.bytes_total > 0 {
            (sample.bytes_sent as f64 / sample.bytes_total as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let rate = if elapsed > 0.0 {
            sample.bytes_sent as f64 / elapsed
        } else {
            0.0
        };

        let (eta_seconds_raw, eta_human) = if fraction > 0.0 {
            let eta = (((1.0 - fraction) * elapsed) / fraction).floor() as i64;
            (eta, format_seconds(eta, self.eta_quantum))
        } else {
            (-1, String::new())
        };

        ProgressReport {
            elapsed_seconds: elapsed,
            elapsed_human: format_seconds(elapsed as i64, None),
            fraction,
            percent: format!("{}%", (fraction * 100.0).floor() as u64),
            bytes_sent: sample.bytes_sent,
            bytes_sent_human: format_bytes(sample.bytes_sent),
            bytes_total: sample.bytes_total,
            bytes_total_human: format_bytes(sample.bytes_total),
            rate_bytes_per_sec: rate,
            rate_human: format!("{}/sec", format_bytes(rate as u64)),
            eta_seconds_raw,
            eta_human,
        }
    }
}
