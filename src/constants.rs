//! Calibrated constants shared across the alignment pipeline.
//!
//! The similarity weights and the thresholds below are tuned together; the
//! scorer is a deliberate approximation (raw n-gram count cosine, character
//! set F1) and the thresholds only make sense against it.

/// Batches shorter than this are dropped until more transcript arrives.
pub const MIN_BATCH_TOKENS: usize = 3;
/// Default number of trailing spoken tokens that form a batch.
pub const DEFAULT_BATCH_WINDOW_TOKENS: usize = 12;
/// Finalized tokens retained for coverage checks.
pub const SPOKEN_TAIL_CAPACITY: usize = 64;

// Similarity weights.
pub const COSINE_WEIGHT: f64 = 0.5;
pub const CHAR_F1_WEIGHT: f64 = 0.3;
pub const JACCARD_WEIGHT: f64 = 0.2;
pub const NUMERIC_ENTITY_BONUS: f64 = 0.1;
pub const NAME_ENTITY_BONUS: f64 = 0.15;
pub const SHORT_LINE_PENALTY: f64 = 0.12;
pub const SHORT_LINE_TOKENS: usize = 5;
pub const META_LINE_FACTOR: f64 = 0.5;
pub const META_LINE_PENALTY: f64 = 0.2;
pub const HEADER_PRIOR: f64 = 0.6;

// Viterbi step.
pub const VITERBI_ALPHA: f64 = 0.15;
pub const VITERBI_BETA: f64 = 0.08;
pub const VITERBI_LOOP_PENALTY: f64 = 0.25;
pub const VITERBI_JUMP_SCALE: f64 = 20.0;
pub const PATH_HISTORY_LEN: usize = 64;
pub const SMOOTHED_INDEX_ALPHA: f64 = 0.3;

// Stall detection and rescue.
pub const DEFAULT_STALL_MS: u64 = 1400;
pub const STALL_MEAN_SIMILARITY: f64 = 0.65;
pub const SIMILARITY_WINDOW: usize = 10;
pub const DEFAULT_RESCUE_EXIT_MS: u64 = 3000;
pub const RESCUE_MIN_AHEAD: usize = 900;
pub const RESCUE_EXIT_LINE_JUMP: usize = 2;
pub const RESCUE_EXIT_SIMILARITY: f64 = 0.7;
pub const DEFAULT_LOST_MS: u64 = 1800;
pub const LOCKED_MEAN_SIMILARITY: f64 = 0.7;
pub const LOST_FALLBACK_STREAK: u32 = 4;

// Anchors.
pub const MAX_ANCHORS: usize = 10;
pub const ANCHOR_RADIUS_LOST: usize = 300;
pub const ANCHOR_RADIUS_LOCKED: usize = 200;
pub const ANCHOR_RADIUS_DEFAULT: usize = 50;
pub const ANCHOR_MIN_SCORE: f64 = 0.75;
pub const ANCHOR_STRONG_SCORE: f64 = 0.9;
pub const ANCHOR_MAX_NEAR_JUMP: usize = 60;
pub const DEFAULT_ANCHOR_RATE_LIMIT_MS: u64 = 1200;
pub const ANCHOR_FREEZE_BATCHES: u32 = 2;

// Forced commit watchdog.
pub const DEFAULT_TICK_MS: u64 = 250;
pub const DEFAULT_FORCED_COMMIT_TICKS: u32 = 6;
pub const DEFAULT_CATCH_UP_BURST_MS: u64 = 1500;

// Soft-advance.
pub const DEFAULT_SOFT_ADVANCE_STALL_MS: u64 = 1200;
pub const SOFT_ADVANCE_COVERAGE: f64 = 0.88;
pub const SOFT_ADVANCE_PROBE_LINES: usize = 4;
pub const SOFT_ADVANCE_MIN_SIMILARITY: f64 = 0.54;
pub const SOFT_ADVANCE_LOST_MIN_SIMILARITY: f64 = 0.62;
pub const SOFT_ADVANCE_STREAK_CAP: u32 = 2;
pub const SOFT_ADVANCE_LOST_STREAK_CAP: u32 = 1;
pub const SOFT_ADVANCE_CONSISTENCY_RELIEF: f64 = 0.04;
pub const SOFT_ADVANCE_CONSISTENCY_STEPS: u32 = 3;
pub const DEFAULT_MANUAL_NUDGE_FREEZE_BATCHES: u32 = 3;

// Rejection gates.
pub const MAX_OOV_RATIO: f64 = 0.5;
pub const MAX_FILLER_RATIO: f64 = 0.4;

// Jitter.
pub const JITTER_CAPACITY: usize = 30;
pub const JITTER_SPIKE_STD: f64 = 15.0;
pub const JITTER_SPIKE_MS: u64 = 2000;
pub const JITTER_THRESHOLD_BUMP: f64 = 0.08;
pub const JITTER_SAMPLE_TTL_MS: u64 = 6000;

// Script indexing.
pub const VIRTUAL_LINE_MIN_CHARS: usize = 35;
pub const VIRTUAL_LINE_MAX_CHARS: usize = 120;
pub const META_MAX_TOKENS: usize = 5;
pub const SIGNATURE_TOKENS: usize = 4;

// Scroll controller.
pub const DEFAULT_MARKER_PERCENT: f64 = 0.38;
pub const END_EASING_START: f64 = 0.85;
pub const END_EASING_FACTOR: f64 = 1.5;
pub const ANTI_BACKSCROLL_RATIO: f64 = 0.72;
pub const ANTI_BACKSCROLL_EPSILON_PX: f64 = 2.0;
pub const MARKER_CLAMP_VIEWPORTS: f64 = 1.2;
pub const MARKER_CLAMP_MIN_MULTIPLIER: f64 = 1.5;
pub const MARKER_CLAMP_MAX_MULTIPLIER: f64 = 2.0;
pub const FINAL_MIN_INTERVAL_MS: u64 = 50;
pub const CATCH_UP_GAIN: f64 = 0.15;
pub const CATCH_UP_MAX_STEP_PX: f64 = 6.0;

// Bias controller.
pub const BIAS_EMA_KEEP: f64 = 0.8;
pub const BIAS_LOCK_PX: f64 = 12.0;
pub const BIAS_TAPER_START: f64 = 0.8;
pub const BIAS_TAPER_FACTOR: f64 = 0.6;
pub const BREATHING_PAUSE_MS: u64 = 700;
pub const BREATHING_DECAY_MS: f64 = 400.0;
pub const BREATHING_WINDOW_MS: u64 = 1200;
pub const DEFAULT_BASE_SPEED_PX_PER_S: f64 = 40.0;

// Transcript handling.
pub const DEFAULT_INTERIM_THROTTLE_MS: u64 = 130;
pub const DEFAULT_LAYOUT_READY_TIMEOUT_MS: u64 = 2000;
