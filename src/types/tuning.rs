//! Tuning presets and the immutable profile swapped in by `reconfigure`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_SPEED_PX_PER_S, DEFAULT_LOST_MS, DEFAULT_MARKER_PERCENT,
};
use crate::error::{Result, SyncError};

/// How eagerly weak matches are accepted and how far the search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggressiveness {
    Conservative,
    #[default]
    Normal,
    Aggressive,
    AggressiveLive,
}

/// Resolved matching parameters for an [`Aggressiveness`] preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggressivenessParams {
    pub similarity_threshold: f64,
    pub window_back: usize,
    pub window_ahead: usize,
    /// Forward jumps scoring below this are clamped to `max_jump_ahead_words`.
    pub strict_forward_similarity: f64,
    pub max_jump_ahead_words: usize,
}

impl Aggressiveness {
    pub const ALL: [Self; 4] = [
        Self::Conservative,
        Self::Normal,
        Self::Aggressive,
        Self::AggressiveLive,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Normal => "normal",
            Self::Aggressive => "aggressive",
            Self::AggressiveLive => "aggressive-live",
        }
    }

    #[must_use]
    pub fn params(self) -> AggressivenessParams {
        match self {
            Self::Conservative => AggressivenessParams {
                similarity_threshold: 0.62,
                window_back: 20,
                window_ahead: 120,
                strict_forward_similarity: 0.82,
                max_jump_ahead_words: 12,
            },
            Self::Normal => AggressivenessParams {
                similarity_threshold: 0.55,
                window_back: 40,
                window_ahead: 200,
                strict_forward_similarity: 0.78,
                max_jump_ahead_words: 18,
            },
            Self::Aggressive => AggressivenessParams {
                similarity_threshold: 0.48,
                window_back: 80,
                window_ahead: 320,
                strict_forward_similarity: 0.72,
                max_jump_ahead_words: 28,
            },
            Self::AggressiveLive => AggressivenessParams {
                similarity_threshold: 0.44,
                window_back: 120,
                window_ahead: 450,
                strict_forward_similarity: 0.68,
                max_jump_ahead_words: 40,
            },
        }
    }
}

/// How smoothly the viewport chases the committed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Smoothness {
    Stable,
    #[default]
    Balanced,
    Responsive,
}

/// Resolved motion parameters for a [`Smoothness`] preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothnessParams {
    pub dead_zone_px: f64,
    pub throttle_ms: u64,
    pub forward_cap_px: f64,
    pub backward_cap_px: f64,
    /// Largest committed-index advance per interim batch.
    pub max_commit_step: usize,
    /// Consecutive agreeing interim predictions needed before a commit.
    pub stable_hits: u32,
}

impl Smoothness {
    pub const ALL: [Self; 3] = [Self::Stable, Self::Balanced, Self::Responsive];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Balanced => "balanced",
            Self::Responsive => "responsive",
        }
    }

    #[must_use]
    pub fn params(self) -> SmoothnessParams {
        match self {
            Self::Stable => SmoothnessParams {
                dead_zone_px: 22.0,
                throttle_ms: 280,
                forward_cap_px: 80.0,
                backward_cap_px: 30.0,
                max_commit_step: 6,
                stable_hits: 3,
            },
            Self::Balanced => SmoothnessParams {
                dead_zone_px: 20.0,
                throttle_ms: 260,
                forward_cap_px: 95.0,
                backward_cap_px: 80.0,
                max_commit_step: 10,
                stable_hits: 2,
            },
            Self::Responsive => SmoothnessParams {
                dead_zone_px: 18.0,
                throttle_ms: 240,
                forward_cap_px: 110.0,
                backward_cap_px: 140.0,
                max_commit_step: 16,
                stable_hits: 1,
            },
        }
    }
}

macro_rules! impl_preset_parsing {
    ($ty:ty, $kind:literal) => {
        impl FromStr for $ty {
            type Err = SyncError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
                Self::ALL
                    .into_iter()
                    .find(|preset| preset.label() == wanted)
                    .ok_or_else(|| SyncError::UnknownPreset {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

impl_preset_parsing!(Aggressiveness, "aggressiveness");
impl_preset_parsing!(Smoothness, "smoothness");

/// Gains and limits of the bias feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidParams {
    /// Bias per pixel of filtered error.
    pub kp: f64,
    /// Bias per pixel-per-second of error change.
    pub kd: f64,
    /// Bias magnitude limit as a fraction of base speed.
    pub max_bias_pct: f64,
    /// Minimum match similarity that counts as a confident update.
    pub conf_min: f64,
    pub decay_ms: f64,
    pub lost_ms: u64,
    pub base_speed_px_per_s: f64,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 0.0006,
            kd: 0.0002,
            max_bias_pct: 0.12,
            conf_min: 0.6,
            decay_ms: 550.0,
            lost_ms: DEFAULT_LOST_MS,
            base_speed_px_per_s: DEFAULT_BASE_SPEED_PX_PER_S,
        }
    }
}

/// Every runtime-mutable tuning input, swapped as one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningProfile {
    /// Fraction of viewport height where the active line should sit.
    pub marker_percent: f64,
    pub aggressiveness: Aggressiveness,
    pub smoothness: Smoothness,
    /// Run the bias controller against a continuous autoscroll.
    pub hybrid_lock: bool,
    pub pid: PidParams,
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            marker_percent: DEFAULT_MARKER_PERCENT,
            aggressiveness: Aggressiveness::default(),
            smoothness: Smoothness::default(),
            hybrid_lock: false,
            pid: PidParams::default(),
        }
    }
}

impl TuningProfile {
    /// Start a fluent builder for `TuningProfile`.
    #[must_use]
    pub fn builder() -> TuningProfileBuilder {
        TuningProfileBuilder::default()
    }

    #[must_use]
    pub fn matching(&self) -> AggressivenessParams {
        self.aggressiveness.params()
    }

    #[must_use]
    pub fn motion(&self) -> SmoothnessParams {
        self.smoothness.params()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: Self =
            serde_json::from_str(json).map_err(|err| SyncError::json("parsing tuning profile", err))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| SyncError::json("serializing tuning profile", err))
    }

    /// Reject values the controllers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.marker_percent.is_finite() && (0.0..=1.0).contains(&self.marker_percent)) {
            return Err(SyncError::tuning("marker_percent", "must be within 0..=1"));
        }
        let pid = &self.pid;
        for (field, value) in [("pid.kp", pid.kp), ("pid.kd", pid.kd)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SyncError::tuning(field, "must be finite and non-negative"));
            }
        }
        if !(pid.max_bias_pct.is_finite() && pid.max_bias_pct > 0.0 && pid.max_bias_pct < 1.0) {
            return Err(SyncError::tuning("pid.max_bias_pct", "must be within (0, 1)"));
        }
        if !(pid.conf_min.is_finite() && (0.0..=1.0).contains(&pid.conf_min)) {
            return Err(SyncError::tuning("pid.conf_min", "must be within 0..=1"));
        }
        if !(pid.decay_ms.is_finite() && pid.decay_ms > 0.0) {
            return Err(SyncError::tuning("pid.decay_ms", "must be positive"));
        }
        if pid.lost_ms == 0 {
            return Err(SyncError::tuning("pid.lost_ms", "must be positive"));
        }
        if !(pid.base_speed_px_per_s.is_finite() && pid.base_speed_px_per_s >= 0.0) {
            return Err(SyncError::tuning(
                "pid.base_speed_px_per_s",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TuningProfileBuilder {
    inner: TuningProfile,
}

impl TuningProfileBuilder {
    #[must_use]
    pub fn marker_percent(mut self, percent: f64) -> Self {
        self.inner.marker_percent = percent;
        self
    }

    #[must_use]
    pub fn aggressiveness(mut self, preset: Aggressiveness) -> Self {
        self.inner.aggressiveness = preset;
        self
    }

    #[must_use]
    pub fn smoothness(mut self, preset: Smoothness) -> Self {
        self.inner.smoothness = preset;
        self
    }

    #[must_use]
    pub fn hybrid_lock(mut self, enabled: bool) -> Self {
        self.inner.hybrid_lock = enabled;
        self
    }

    #[must_use]
    pub fn pid(mut self, pid: PidParams) -> Self {
        self.inner.pid = pid;
        self
    }

    pub fn build(self) -> Result<TuningProfile> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_from_labels() {
        assert_eq!("aggressive-live".parse::<Aggressiveness>().unwrap(), Aggressiveness::AggressiveLive);
        assert_eq!("Aggressive_Live".parse::<Aggressiveness>().unwrap(), Aggressiveness::AggressiveLive);
        assert_eq!("stable".parse::<Smoothness>().unwrap(), Smoothness::Stable);
        let err = "wild".parse::<Smoothness>().unwrap_err();
        assert!(matches!(err, SyncError::UnknownPreset { kind: "smoothness", .. }));
    }

    #[test]
    fn windows_widen_with_aggressiveness() {
        let mut last_ahead = 0;
        let mut last_threshold = 1.0;
        for preset in Aggressiveness::ALL {
            let params = preset.params();
            assert!(params.window_ahead > last_ahead);
            assert!(params.similarity_threshold < last_threshold);
            assert!((20..=450).contains(&params.window_back));
            assert!((20..=450).contains(&params.window_ahead));
            last_ahead = params.window_ahead;
            last_threshold = params.similarity_threshold;
        }
    }

    #[test]
    fn smoothness_ranges_match_motion_envelope() {
        for preset in Smoothness::ALL {
            let p = preset.params();
            assert!((18.0..=22.0).contains(&p.dead_zone_px));
            assert!((240..=280).contains(&p.throttle_ms));
            assert!((80.0..=110.0).contains(&p.forward_cap_px));
            assert!((30.0..=140.0).contains(&p.backward_cap_px));
            assert!(p.stable_hits >= 1);
        }
    }

    #[test]
    fn builder_validates() {
        let profile = TuningProfile::builder()
            .marker_percent(0.4)
            .smoothness(Smoothness::Responsive)
            .build()
            .expect("valid profile");
        assert_eq!(profile.motion().stable_hits, 1);

        let err = TuningProfile::builder().marker_percent(1.5).build().unwrap_err();
        assert!(matches!(err, SyncError::InvalidTuning { field: "marker_percent", .. }));

        let pid = PidParams {
            max_bias_pct: 0.0,
            ..PidParams::default()
        };
        assert!(TuningProfile::builder().pid(pid).build().is_err());
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let profile = TuningProfile::from_json_str(
            r#"{"aggressiveness":"aggressive","smoothness":"stable","pid":{"kp":0.001}}"#,
        )
        .expect("parse");
        assert_eq!(profile.aggressiveness, Aggressiveness::Aggressive);
        assert_eq!(profile.smoothness, Smoothness::Stable);
        assert!((profile.pid.kp - 0.001).abs() < 1e-12);
        assert!((profile.pid.max_bias_pct - 0.12).abs() < 1e-12);
        assert!((profile.marker_percent - DEFAULT_MARKER_PERCENT).abs() < 1e-12);

        let json = profile.to_json_string().expect("serialize");
        assert_eq!(TuningProfile::from_json_str(&json).expect("reparse"), profile);

        assert!(TuningProfile::from_json_str(r#"{"marker_percent":-1}"#).is_err());
        assert!(matches!(
            TuningProfile::from_json_str("{not json").unwrap_err(),
            SyncError::Json { .. }
        ));
    }
}
