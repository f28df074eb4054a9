//! Plain state records owned by a single engine instance.
//!
//! All of these reset together on script swap, restart, or disable. Nothing
//! outside the engine mutates them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::{PATH_HISTORY_LEN, SMOOTHED_INDEX_ALPHA};

/// Where the engine believes the speaker is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentState {
    /// Last committed word index. Only moves forward until an explicit reset.
    pub committed_index: usize,
    /// Latest Viterbi estimate; may lead or trail the committed index.
    pub predicted_index: usize,
    pub path_history: VecDeque<usize>,
    /// EMA of the predicted index, for display.
    pub smoothed_index: f64,
    pub last_commit_ms: u64,
    /// Consecutive Viterbi steps that landed on the same index.
    pub viterbi_consistency: u32,
    /// Consecutive batches whose candidates came from the fallback window.
    pub fallback_streak: u32,
    /// Consecutive interim predictions agreeing with the previous one.
    pub stable_hits: u32,
}

impl AlignmentState {
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_commit_ms: now_ms,
            ..Self::default()
        }
    }

    /// Record a new predicted index in the path and the EMA.
    pub fn push_prediction(&mut self, index: usize) {
        if self.path_history.back() == Some(&index) {
            self.viterbi_consistency += 1;
        } else {
            self.viterbi_consistency = 0;
        }
        if self.path_history.len() == PATH_HISTORY_LEN {
            self.path_history.pop_front();
        }
        self.path_history.push_back(index);
        self.predicted_index = index;
        self.smoothed_index = if self.path_history.len() == 1 {
            index as f64
        } else {
            SMOOTHED_INDEX_ALPHA * index as f64 + (1.0 - SMOOTHED_INDEX_ALPHA) * self.smoothed_index
        };
    }

    /// Move the committed index forward. Returns false when `target` would
    /// not advance it.
    pub fn commit(&mut self, target: usize, now_ms: u64) -> bool {
        if target <= self.committed_index {
            return false;
        }
        self.committed_index = target;
        self.last_commit_ms = now_ms;
        true
    }

    #[must_use]
    pub fn since_commit_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_commit_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RescueState {
    pub active: bool,
    pub entered_at_ms: u64,
    /// Consecutive watchdog ticks without movement.
    pub consecutive_stall_count: u32,
    /// Batches during which soft-advance stays suppressed.
    pub freeze_batches: u32,
    pub last_anchor_ms: Option<u64>,
}

/// Coarse confidence in the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Locked,
    #[default]
    Seeking,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiasMode {
    Locked,
    LockSeek,
    #[default]
    Coast,
    Lost,
}

/// Diagnostics only; the controller never reads these back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BiasTelemetry {
    pub locked_ms: u64,
    pub lock_seek_ms: u64,
    pub coast_ms: u64,
    pub lost_ms: u64,
    pub mean_abs_error_px: f64,
    pub samples: u64,
}

impl BiasTelemetry {
    pub(crate) fn accumulate(&mut self, mode: BiasMode, dt_ms: u64) {
        match mode {
            BiasMode::Locked => self.locked_ms += dt_ms,
            BiasMode::LockSeek => self.lock_seek_ms += dt_ms,
            BiasMode::Coast => self.coast_ms += dt_ms,
            BiasMode::Lost => self.lost_ms += dt_ms,
        }
    }

    pub(crate) fn record_error(&mut self, abs_error: f64) {
        self.samples += 1;
        self.mean_abs_error_px += (abs_error - self.mean_abs_error_px) / self.samples as f64;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BiasState {
    /// Speed bias as a fraction of base speed, e.g. `0.05` is +5%.
    pub bias_percent: f64,
    pub filtered_error: f64,
    pub last_error: f64,
    pub mode: BiasMode,
    pub telemetry: BiasTelemetry,
}
