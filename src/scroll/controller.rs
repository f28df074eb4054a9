//! Turn the committed word index into bounded viewport corrections.

use crate::constants::{
    ANTI_BACKSCROLL_EPSILON_PX, ANTI_BACKSCROLL_RATIO, CATCH_UP_GAIN, CATCH_UP_MAX_STEP_PX,
    END_EASING_FACTOR, END_EASING_START, FINAL_MIN_INTERVAL_MS, MARKER_CLAMP_MAX_MULTIPLIER,
    MARKER_CLAMP_MIN_MULTIPLIER, MARKER_CLAMP_VIEWPORTS,
};
use crate::scroll::bias::BiasController;
use crate::types::{SmoothnessParams, TuningProfile, ViewportSnapshot};

/// Offsets closer than this are treated as no movement.
const MIN_MOVE_PX: f64 = 0.01;

/// Scroll offset that puts `word`'s line on the marker, clamped to the
/// scrollable range. `None` when neither geometry nor content height is known.
#[must_use]
pub fn target_offset(
    snapshot: &ViewportSnapshot,
    word: usize,
    total_words: usize,
    marker_percent: f64,
) -> Option<f64> {
    let top = snapshot.estimate_top(word, total_words)?;
    let marker = snapshot.viewport_height * marker_percent;
    Some((top - marker).clamp(0.0, snapshot.max_scroll()))
}

/// Velocity multiplier when the active line is far from the marker.
#[must_use]
pub fn marker_multiplier(distance_px: f64, viewport_height: f64) -> f64 {
    if viewport_height <= 0.0 {
        return 1.0;
    }
    let viewports = distance_px.abs() / viewport_height;
    if viewports <= MARKER_CLAMP_VIEWPORTS {
        return 1.0;
    }
    let excess = ((viewports - MARKER_CLAMP_VIEWPORTS) / MARKER_CLAMP_VIEWPORTS).min(1.0);
    MARKER_CLAMP_MIN_MULTIPLIER + (MARKER_CLAMP_MAX_MULTIPLIER - MARKER_CLAMP_MIN_MULTIPLIER) * excess
}

/// Near the bottom, upward motion is limited to a few pixels.
#[must_use]
pub fn anti_backscroll(step: f64, ratio: f64) -> f64 {
    if ratio > ANTI_BACKSCROLL_RATIO && step < 0.0 {
        step.max(-ANTI_BACKSCROLL_EPSILON_PX)
    } else {
        step
    }
}

/// Forward and backward allowance for one correction cycle. Caps relax near
/// the end of the script.
#[must_use]
pub fn cycle_caps(ratio: f64, motion: &SmoothnessParams, multiplier: f64) -> CycleBudget {
    let easing = if ratio >= END_EASING_START {
        END_EASING_FACTOR
    } else {
        1.0
    };
    CycleBudget {
        forward: motion.forward_cap_px * easing * multiplier,
        backward: motion.backward_cap_px * easing * multiplier,
    }
}

/// Cap one corrective step.
#[must_use]
pub fn limit_step(delta: f64, ratio: f64, motion: &SmoothnessParams, multiplier: f64) -> f64 {
    cycle_caps(ratio, motion, multiplier).clamp(delta, ratio)
}

/// Small proportional step used between throttled corrections.
#[must_use]
pub fn catch_up_step(delta: f64) -> f64 {
    delta.signum() * (delta.abs() * CATCH_UP_GAIN).min(CATCH_UP_MAX_STEP_PX)
}

/// Motion still allowed in the current correction cycle, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleBudget {
    pub forward: f64,
    pub backward: f64,
}

impl CycleBudget {
    /// Clamp `delta` to the remaining allowance, honoring anti-backscroll.
    #[must_use]
    pub fn clamp(&self, delta: f64, ratio: f64) -> f64 {
        anti_backscroll(delta.clamp(-self.backward, self.forward), ratio)
    }

    /// Charge a step against the allowance.
    pub fn spend(&mut self, step: f64) {
        if step > 0.0 {
            self.forward = (self.forward - step).max(0.0);
        } else {
            self.backward = (self.backward + step).max(0.0);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollController {
    target_word: Option<usize>,
    pending_final: bool,
    last_write_ms: Option<u64>,
    /// Remaining allowance of the cycle opened by the last write.
    budget: CycleBudget,
    last_frame_ms: Option<u64>,
    burst_until_ms: Option<u64>,
    sequence: u64,
}

impl ScrollController {
    pub fn reset(&mut self) {
        *self = Self {
            sequence: self.sequence,
            ..Self::default()
        };
    }

    /// Aim at `word`. Final matches shorten the write interval.
    pub fn request(&mut self, word: usize, is_final: bool) {
        self.target_word = Some(word);
        self.pending_final |= is_final;
    }

    #[must_use]
    pub fn target_word(&self) -> Option<usize> {
        self.target_word
    }

    pub fn start_burst(&mut self, now_ms: u64, duration_ms: u64) {
        self.burst_until_ms = Some(now_ms + duration_ms);
    }

    #[must_use]
    pub fn burst_active(&self, now_ms: u64) -> bool {
        self.burst_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Monotonic command counter; survives resets.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn multiplier(&self, now_ms: u64, delta: f64, viewport_height: f64) -> f64 {
        let mut multiplier = marker_multiplier(delta, viewport_height);
        if self.burst_active(now_ms) {
            multiplier = multiplier.max(MARKER_CLAMP_MIN_MULTIPLIER);
        }
        multiplier
    }

    /// Next offset for alignment-driven scrolling, or `None` to stay put.
    ///
    /// One corrective write opens a cycle. Between writes only a catch-up
    /// burst may keep moving, and only within what is left of the cycle's caps.
    pub fn correction(
        &mut self,
        now_ms: u64,
        snapshot: &ViewportSnapshot,
        total_words: usize,
        profile: &TuningProfile,
    ) -> Option<f64> {
        self.last_frame_ms = Some(now_ms);
        let word = self.target_word?;
        let motion = profile.motion();
        let current = snapshot.scroll_offset;
        let target = target_offset(snapshot, word, total_words, profile.marker_percent)?;
        let delta = target - current;
        if delta.abs() < motion.dead_zone_px {
            return None;
        }
        let ratio = snapshot.scroll_ratio(current);
        let interval = if self.pending_final {
            FINAL_MIN_INTERVAL_MS
        } else {
            motion.throttle_ms
        };
        let due = self
            .last_write_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= interval);
        let step = if due {
            let multiplier = self.multiplier(now_ms, delta, snapshot.viewport_height);
            self.budget = cycle_caps(ratio, &motion, multiplier);
            self.budget.clamp(delta, ratio)
        } else if self.burst_active(now_ms) {
            self.budget.clamp(catch_up_step(delta), ratio)
        } else {
            return None;
        };
        let next = (current + step).clamp(0.0, snapshot.max_scroll());
        if (next - current).abs() < MIN_MOVE_PX {
            return None;
        }
        if due {
            self.last_write_ms = Some(now_ms);
            self.pending_final = false;
        }
        self.budget.spend(next - current);
        Some(next)
    }

    /// Next offset for hybrid autoscroll: constant speed scaled by the bias,
    /// with direct corrections only when the line is far off the marker.
    pub fn hybrid_step(
        &mut self,
        now_ms: u64,
        snapshot: &ViewportSnapshot,
        total_words: usize,
        profile: &TuningProfile,
        bias: &BiasController,
    ) -> Option<f64> {
        let dt_ms = self
            .last_frame_ms
            .map_or(0, |last| now_ms.saturating_sub(last));
        self.last_frame_ms = Some(now_ms);
        let current = snapshot.scroll_offset;
        let mut next = current + bias.speed(&profile.pid) * dt_ms as f64 / 1000.0;

        if let Some(target) = self
            .target_word
            .and_then(|word| target_offset(snapshot, word, total_words, profile.marker_percent))
        {
            let delta = target - next;
            if delta.abs() > MARKER_CLAMP_VIEWPORTS * snapshot.viewport_height {
                let ratio = snapshot.scroll_ratio(next);
                let multiplier = self.multiplier(now_ms, delta, snapshot.viewport_height);
                next += limit_step(delta, ratio, &profile.motion(), multiplier);
            }
        }

        let next = next.clamp(0.0, snapshot.max_scroll());
        ((next - current).abs() >= MIN_MOVE_PX).then_some(next)
    }
}
