//! Rolling spread of (predicted - committed) deltas.
//!
//! A burst of erratic predictions opens a spike window during which the
//! acceptance threshold is raised.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::{
    JITTER_CAPACITY, JITTER_SAMPLE_TTL_MS, JITTER_SPIKE_MS, JITTER_SPIKE_STD,
    JITTER_THRESHOLD_BUMP,
};

/// Fewer samples than this never open a spike window.
const MIN_SPIKE_SAMPLES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JitterState {
    samples: VecDeque<(u64, f64)>,
    spike_until_ms: Option<u64>,
}

/// Serializable view for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JitterSummary {
    pub samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub spiking: bool,
}

impl JitterState {
    pub fn record(&mut self, now_ms: u64, delta: f64) {
        if self.samples.len() == JITTER_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back((now_ms, delta));
        if self.samples.len() >= MIN_SPIKE_SAMPLES && self.std_dev() > JITTER_SPIKE_STD {
            if self.spike_until_ms.is_none() {
                tracing::debug!(target: "scriptsync::align", std_dev = self.std_dev(), "jitter spike");
            }
            self.spike_until_ms = Some(now_ms + JITTER_SPIKE_MS);
        }
    }

    /// Drop stale samples and close an expired spike window.
    pub fn decay(&mut self, now_ms: u64) {
        while self
            .samples
            .front()
            .is_some_and(|&(at, _)| now_ms.saturating_sub(at) > JITTER_SAMPLE_TTL_MS)
        {
            self.samples.pop_front();
        }
        if self.spike_until_ms.is_some_and(|until| now_ms >= until) {
            self.spike_until_ms = None;
        }
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|&(_, d)| d).sum::<f64>() / self.samples.len() as f64
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|&(_, d)| (d - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    #[must_use]
    pub fn is_spiking(&self, now_ms: u64) -> bool {
        self.spike_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Added to the similarity threshold while a spike window is open.
    #[must_use]
    pub fn threshold_bump(&self, now_ms: u64) -> f64 {
        if self.is_spiking(now_ms) {
            JITTER_THRESHOLD_BUMP
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn summary(&self, now_ms: u64) -> JitterSummary {
        JitterSummary {
            samples: self.samples.len(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            spiking: self.is_spiking(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_deltas_never_spike() {
        let mut jitter = JitterState::default();
        for i in 0..50 {
            jitter.record(i * 100, 3.0);
        }
        assert_eq!(jitter.summary(5000).samples, JITTER_CAPACITY);
        assert_eq!(jitter.std_dev(), 0.0);
        assert_eq!(jitter.threshold_bump(5000), 0.0);
    }

    #[test]
    fn erratic_deltas_open_a_window() {
        let mut jitter = JitterState::default();
        for (i, delta) in [0.0, 40.0, -30.0, 60.0, 2.0].into_iter().enumerate() {
            jitter.record(i as u64 * 100, delta);
        }
        assert!(jitter.is_spiking(500));
        assert_eq!(jitter.threshold_bump(500), JITTER_THRESHOLD_BUMP);
        // The window is measured from the last spiking sample at 400ms.
        assert!(jitter.is_spiking(2399));
        jitter.decay(2400);
        assert!(!jitter.is_spiking(2400));
    }

    #[test]
    fn decay_drops_old_samples() {
        let mut jitter = JitterState::default();
        jitter.record(0, 1.0);
        jitter.record(5_000, 1.0);
        jitter.decay(7_000);
        assert_eq!(jitter.summary(7_000).samples, 1);
    }
}
