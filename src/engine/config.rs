//! Timing configuration fixed for the lifetime of an engine.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANCHOR_RATE_LIMIT_MS, DEFAULT_BATCH_WINDOW_TOKENS, DEFAULT_CATCH_UP_BURST_MS,
    DEFAULT_FORCED_COMMIT_TICKS, DEFAULT_INTERIM_THROTTLE_MS, DEFAULT_LAYOUT_READY_TIMEOUT_MS,
    DEFAULT_LOST_MS, DEFAULT_MANUAL_NUDGE_FREEZE_BATCHES, DEFAULT_RESCUE_EXIT_MS,
    DEFAULT_SOFT_ADVANCE_STALL_MS, DEFAULT_STALL_MS, DEFAULT_TICK_MS, MIN_BATCH_TOKENS,
    SPOKEN_TAIL_CAPACITY,
};
use crate::error::{Result, SyncError};

/// Engine timing knobs. Tuning presets live in [`crate::TuningProfile`];
/// these are the values hosts rarely touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// No-commit time after which weak matches count as a stall.
    pub stall_ms: u64,
    /// No-commit time after which weak matches count as lost.
    pub lost_ms: u64,
    pub rescue_exit_ms: u64,
    /// Minimum spacing between accepted anchor jumps.
    pub anchor_rate_limit_ms: u64,
    /// Time on one virtual line before soft-advance may fire.
    pub soft_advance_stall_ms: u64,
    pub manual_nudge_freeze_batches: u32,
    /// Cadence the host is expected to call `tick` at.
    pub tick_interval_ms: u64,
    /// Quiet ticks before the watchdog forces a commit.
    pub forced_commit_ticks: u32,
    pub catch_up_burst_ms: u64,
    /// Minimum spacing between interim events; `0` disables throttling.
    pub interim_throttle_ms: u64,
    /// Trailing spoken tokens compared per batch.
    pub batch_window_tokens: usize,
    pub layout_ready_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stall_ms: DEFAULT_STALL_MS,
            lost_ms: DEFAULT_LOST_MS,
            rescue_exit_ms: DEFAULT_RESCUE_EXIT_MS,
            anchor_rate_limit_ms: DEFAULT_ANCHOR_RATE_LIMIT_MS,
            soft_advance_stall_ms: DEFAULT_SOFT_ADVANCE_STALL_MS,
            manual_nudge_freeze_batches: DEFAULT_MANUAL_NUDGE_FREEZE_BATCHES,
            tick_interval_ms: DEFAULT_TICK_MS,
            forced_commit_ticks: DEFAULT_FORCED_COMMIT_TICKS,
            catch_up_burst_ms: DEFAULT_CATCH_UP_BURST_MS,
            interim_throttle_ms: DEFAULT_INTERIM_THROTTLE_MS,
            batch_window_tokens: DEFAULT_BATCH_WINDOW_TOKENS,
            layout_ready_timeout_ms: DEFAULT_LAYOUT_READY_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BATCH_TOKENS..=SPOKEN_TAIL_CAPACITY).contains(&self.batch_window_tokens) {
            return Err(SyncError::config(format!(
                "batch_window_tokens must be within {MIN_BATCH_TOKENS}..={SPOKEN_TAIL_CAPACITY}"
            )));
        }
        if self.forced_commit_ticks == 0 {
            return Err(SyncError::config("forced_commit_ticks must be at least 1"));
        }
        for (name, value) in [
            ("stall_ms", self.stall_ms),
            ("lost_ms", self.lost_ms),
            ("rescue_exit_ms", self.rescue_exit_ms),
            ("tick_interval_ms", self.tick_interval_ms),
            ("layout_ready_timeout_ms", self.layout_ready_timeout_ms),
        ] {
            if value == 0 {
                return Err(SyncError::config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| SyncError::json("parsing engine config", err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| SyncError::json("serializing engine config", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{"interim_throttle_ms": 0}"#).expect("config");
        assert_eq!(config.interim_throttle_ms, 0);
        assert_eq!(config.stall_ms, DEFAULT_STALL_MS);
    }

    #[test]
    fn rejects_bad_windows() {
        let err = EngineConfig::from_json_str(r#"{"batch_window_tokens": 2}"#).unwrap_err();
        assert!(err.to_string().contains("batch_window_tokens"));
        let err = EngineConfig::from_json_str(r#"{"stall_ms": 0}"#).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig { .. }));
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, SyncError::Json { .. }));
    }
}
