//! Speed-bias feedback for hybrid autoscroll.
//!
//! The autoscroll runs at `base_speed × (1 + bias)`. Confident matches push
//! the bias toward closing the gap between the matched line and the marker;
//! without them the bias relaxes back to zero.

use crate::constants::{
    BIAS_EMA_KEEP, BIAS_LOCK_PX, BIAS_TAPER_FACTOR, BIAS_TAPER_START, BREATHING_DECAY_MS,
    BREATHING_WINDOW_MS,
};
use crate::types::{BiasMode, BiasState, PidParams};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiasController {
    state: BiasState,
    has_error: bool,
    last_update_ms: Option<u64>,
    last_confident_ms: Option<u64>,
    last_decay_ms: Option<u64>,
    last_account_ms: Option<u64>,
    breathing_until_ms: Option<u64>,
}

/// Bias limit, tapered near the end of the script.
#[must_use]
pub fn max_bias(progress: f64, pid: &PidParams) -> f64 {
    if progress > BIAS_TAPER_START {
        pid.max_bias_pct * BIAS_TAPER_FACTOR
    } else {
        pid.max_bias_pct
    }
}

impl BiasController {
    #[must_use]
    pub fn state(&self) -> &BiasState {
        &self.state
    }

    #[must_use]
    pub fn bias_percent(&self) -> f64 {
        self.state.bias_percent
    }

    #[must_use]
    pub fn mode(&self) -> BiasMode {
        self.state.mode
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Effective autoscroll speed for the current bias.
    #[must_use]
    pub fn speed(&self, pid: &PidParams) -> f64 {
        pid.base_speed_px_per_s * (1.0 + self.state.bias_percent)
    }

    /// Feed one lead/lag measurement in pixels (positive: line below marker).
    pub fn observe(&mut self, now_ms: u64, error_px: f64, confidence: f64, progress: f64, pid: &PidParams) {
        self.account(now_ms);
        let previous = self.state.filtered_error;
        let filtered = if self.has_error {
            BIAS_EMA_KEEP * previous + (1.0 - BIAS_EMA_KEEP) * error_px
        } else {
            error_px
        };

        if confidence >= pid.conf_min {
            let dt_s = self
                .last_update_ms
                .map_or(0.0, |last| now_ms.saturating_sub(last) as f64 / 1000.0);
            let derivative = if self.has_error && dt_s > 0.0 {
                (filtered - previous) / dt_s
            } else {
                0.0
            };
            let limit = max_bias(progress, pid);
            self.state.bias_percent =
                (self.state.bias_percent + pid.kp * filtered + pid.kd * derivative).clamp(-limit, limit);
            self.state.mode = if filtered.abs() < BIAS_LOCK_PX {
                BiasMode::Locked
            } else {
                BiasMode::LockSeek
            };
            self.last_confident_ms = Some(now_ms);
            self.last_decay_ms = Some(now_ms);
            self.breathing_until_ms = None;
            self.state.telemetry.record_error(filtered.abs());
        } else {
            self.decay(now_ms, pid);
        }

        self.has_error = true;
        self.state.filtered_error = filtered;
        self.state.last_error = error_px;
        self.last_update_ms = Some(now_ms);
        tracing::trace!(
            target: "scriptsync::bias",
            error_px,
            filtered,
            bias = self.state.bias_percent,
            mode = ?self.state.mode,
            "bias update"
        );
    }

    /// Per-frame upkeep: telemetry and relaxation while no confident match
    /// has arrived for a while.
    pub fn tick(&mut self, now_ms: u64, pause_ms: u64, pid: &PidParams) {
        self.account(now_ms);
        let Some(confident) = self.last_confident_ms else {
            return;
        };
        if now_ms.saturating_sub(confident) >= pause_ms {
            self.decay(now_ms, pid);
        }
    }

    /// A pause in speech: relax faster for a short window.
    pub fn note_pause(&mut self, now_ms: u64) {
        if self.breathing_until_ms.is_none_or(|until| now_ms >= until) {
            self.breathing_until_ms = Some(now_ms + BREATHING_WINDOW_MS);
            tracing::debug!(target: "scriptsync::bias", "breathing window opened");
        }
    }

    #[must_use]
    pub fn is_breathing(&self, now_ms: u64) -> bool {
        self.breathing_until_ms.is_some_and(|until| now_ms < until)
    }

    fn decay(&mut self, now_ms: u64, pid: &PidParams) {
        let dt = self
            .last_decay_ms
            .map_or(0, |last| now_ms.saturating_sub(last)) as f64;
        self.last_decay_ms = Some(now_ms);
        let tau = if self.is_breathing(now_ms) {
            BREATHING_DECAY_MS
        } else {
            pid.decay_ms
        };
        self.state.bias_percent *= (-dt / tau).exp();
        let lost = self
            .last_confident_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= pid.lost_ms);
        self.state.mode = if lost { BiasMode::Lost } else { BiasMode::Coast };
    }

    fn account(&mut self, now_ms: u64) {
        if let Some(last) = self.last_account_ms {
            let mode = self.state.mode;
            self.state.telemetry.accumulate(mode, now_ms.saturating_sub(last));
        }
        self.last_account_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> PidParams {
        PidParams::default()
    }

    #[test]
    fn lagging_viewport_speeds_up() {
        let mut bias = BiasController::default();
        bias.observe(0, 100.0, 0.9, 0.1, &pid());
        assert!(bias.bias_percent() > 0.0);
        assert_eq!(bias.mode(), BiasMode::LockSeek);
        assert!(bias.speed(&pid()) > pid().base_speed_px_per_s);
    }

    #[test]
    fn small_error_locks() {
        let mut bias = BiasController::default();
        bias.observe(0, 5.0, 0.9, 0.1, &pid());
        assert_eq!(bias.mode(), BiasMode::Locked);
    }

    #[test]
    fn bias_is_clamped_and_tapered() {
        let mut bias = BiasController::default();
        for i in 0..200 {
            bias.observe(i * 100, 2000.0, 0.95, 0.5, &pid());
        }
        assert!((bias.bias_percent() - 0.12).abs() < 1e-9);
        for i in 200..400 {
            bias.observe(i * 100, 2000.0, 0.95, 0.9, &pid());
        }
        assert!((bias.bias_percent() - 0.12 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_decays_to_coast_then_lost() {
        let mut bias = BiasController::default();
        bias.observe(0, 200.0, 0.9, 0.1, &pid());
        let before = bias.bias_percent();
        bias.observe(550, 200.0, 0.2, 0.1, &pid());
        assert_eq!(bias.mode(), BiasMode::Coast);
        let expected = before * (-1.0f64).exp();
        assert!((bias.bias_percent() - expected).abs() < 1e-9);
        bias.observe(1800, 200.0, 0.2, 0.1, &pid());
        assert_eq!(bias.mode(), BiasMode::Lost);
    }

    #[test]
    fn breathing_shortens_decay() {
        let mut slow = BiasController::default();
        slow.observe(0, 300.0, 0.9, 0.1, &pid());
        let mut fast = slow.clone();
        fast.note_pause(700);
        slow.tick(700, 700, &pid());
        fast.tick(700, 700, &pid());
        slow.tick(1100, 700, &pid());
        fast.tick(1100, 700, &pid());
        assert!(fast.is_breathing(1100));
        assert!(fast.bias_percent() < slow.bias_percent());
    }

    #[test]
    fn telemetry_tracks_time_in_mode() {
        let mut bias = BiasController::default();
        bias.observe(0, 5.0, 0.9, 0.1, &pid());
        bias.tick(400, 700, &pid());
        assert_eq!(bias.state().telemetry.locked_ms, 400);
        assert_eq!(bias.state().telemetry.samples, 1);
        assert!((bias.state().telemetry.mean_abs_error_px - 5.0).abs() < 1e-9);
    }
}
