//! The alignment engine instance and its entry points.
//!
//! A [`SyncEngine`] owns every piece of mutable alignment state. Hosts drive
//! it through three calls and own all scheduling:
//! - [`SyncEngine::handle_transcript`] for each recognizer event,
//! - [`SyncEngine::tick`] on a watchdog cadence (~250ms),
//! - [`SyncEngine::frame`] once per display frame.
//!
//! Every call runs to completion and leaves the state consistent; nothing is
//! shared between instances.

mod config;
mod tick;
mod transcript;
mod wait;

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use config::EngineConfig;
pub use tick::TickReport;
pub use wait::{ReadinessWait, WaitOutcome};

use crate::align::{
    JitterState, JitterSummary, RescuePolicy, RescueTransition, SimilarityWindow,
    SoftAdvanceState, StallWatch,
};
use crate::constants::{
    LOCKED_MEAN_SIMILARITY, LOST_FALLBACK_STREAK, SPOKEN_TAIL_CAPACITY, STALL_MEAN_SIMILARITY,
};
use crate::error::{Result, SyncError};
use crate::index::{Script, ScriptIndex};
use crate::scroll::{BiasController, ScrollController};
use crate::types::{
    AlignmentState, BiasState, LayoutProvider, RescueState, ScriptSummary, ScrollSink,
    TrackingState, TuningProfile,
};

/// Serializable view of the engine for host diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub engine_id: Uuid,
    pub enabled: bool,
    pub script: Option<ScriptSummary>,
    pub alignment: AlignmentState,
    pub rescue: RescueState,
    pub jitter: JitterSummary,
    pub tracking: TrackingState,
    pub bias: BiasState,
    pub profile: TuningProfile,
    pub layout_ready: Option<WaitOutcome>,
    pub last_similarity: f64,
}

impl EngineSnapshot {
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| SyncError::json("serializing engine snapshot", err))
    }
}

/// Aligns a live transcript against one script and steers the viewport.
pub struct SyncEngine<L: LayoutProvider> {
    id: Uuid,
    config: EngineConfig,
    profile: TuningProfile,
    layout: L,
    sinks: Vec<Box<dyn ScrollSink + Send>>,
    enabled: bool,
    index: Option<Arc<ScriptIndex>>,
    alignment: AlignmentState,
    rescue: RescueState,
    jitter: JitterState,
    similarities: SimilarityWindow,
    tracking: TrackingState,
    soft: SoftAdvanceState,
    watch: StallWatch,
    scroll: ScrollController,
    bias: BiasController,
    readiness: ReadinessWait,
    spoken_tail: VecDeque<String>,
    last_interim_ms: Option<u64>,
    last_speech_ms: Option<u64>,
    pause_noted: bool,
    last_similarity: f64,
}

impl<L: LayoutProvider> SyncEngine<L> {
    /// Create an enabled engine with the default tuning profile.
    pub fn new(layout: L, config: EngineConfig) -> Result<Self> {
        Self::with_profile(layout, config, TuningProfile::default())
    }

    pub fn with_profile(layout: L, config: EngineConfig, profile: TuningProfile) -> Result<Self> {
        config.validate()?;
        profile.validate()?;
        let id = Uuid::new_v4();
        tracing::debug!(target: "scriptsync::engine", engine = %id, "engine created");
        Ok(Self {
            id,
            config,
            profile,
            layout,
            sinks: Vec::new(),
            enabled: true,
            index: None,
            alignment: AlignmentState::new(0),
            rescue: RescueState::default(),
            jitter: JitterState::default(),
            similarities: SimilarityWindow::default(),
            tracking: TrackingState::default(),
            soft: SoftAdvanceState::new(0),
            watch: StallWatch::default(),
            scroll: ScrollController::default(),
            bias: BiasController::default(),
            readiness: ReadinessWait::new(0, config.layout_ready_timeout_ms),
            spoken_tail: VecDeque::with_capacity(SPOKEN_TAIL_CAPACITY),
            last_interim_ms: None,
            last_speech_ms: None,
            pause_noted: false,
            last_similarity: 0.0,
        })
    }

    /// Index `script` and reset all alignment state.
    ///
    /// A script without speakable words is ignored and leaves the engine
    /// untouched. An identical script keeps its index but still resets.
    pub fn load_script(&mut self, script: &Script, now_ms: u64) -> Option<ScriptSummary> {
        let fingerprint = script.fingerprint();
        let reused = self
            .index
            .as_ref()
            .is_some_and(|index| index.fingerprint() == fingerprint);
        if !reused {
            let Some(index) = ScriptIndex::build(script) else {
                tracing::debug!(target: "scriptsync::engine", engine = %self.id, "ignoring empty script");
                return None;
            };
            self.index = Some(Arc::new(index));
        }
        self.reset(now_ms);
        self.readiness = ReadinessWait::new(now_ms, self.config.layout_ready_timeout_ms);
        let summary = self.index.as_ref().map(|index| index.summary(reused));
        if let Some(summary) = &summary {
            tracing::info!(
                target: "scriptsync::engine",
                engine = %self.id,
                tokens = summary.tokens,
                lines = summary.lines,
                reused,
                fingerprint = %summary.fingerprint,
                "script loaded"
            );
        }
        summary
    }

    /// Start the same script over from the top.
    pub fn restart_take(&mut self, now_ms: u64) {
        self.reset(now_ms);
        tracing::debug!(target: "scriptsync::engine", engine = %self.id, "take restarted");
    }

    /// Disabling cancels the watchdog, any catch-up burst and freeze counters
    /// and clears all alignment state; enabling starts fresh.
    pub fn set_enabled(&mut self, enabled: bool, now_ms: u64) {
        if self.enabled == enabled {
            return;
        }
        self.reset(now_ms);
        self.enabled = enabled;
        tracing::debug!(target: "scriptsync::engine", engine = %self.id, enabled, "speech sync toggled");
    }

    /// Swap the whole tuning profile. An invalid profile leaves the current
    /// one in place.
    pub fn reconfigure(&mut self, profile: TuningProfile) -> Result<()> {
        if let Err(err) = profile.validate() {
            tracing::warn!(target: "scriptsync::engine", engine = %self.id, error = %err, "rejected tuning profile");
            return Err(err);
        }
        if self.profile.hybrid_lock && !profile.hybrid_lock {
            self.bias.reset();
        }
        self.profile = profile;
        tracing::debug!(
            target: "scriptsync::engine",
            engine = %self.id,
            aggressiveness = %profile.aggressiveness,
            smoothness = %profile.smoothness,
            hybrid = profile.hybrid_lock,
            "tuning profile applied"
        );
        Ok(())
    }

    /// The user scrolled by hand; hold soft-advance off for a few batches.
    pub fn note_manual_scroll(&mut self, now_ms: u64) {
        self.rescue.freeze_batches = self
            .rescue
            .freeze_batches
            .max(self.config.manual_nudge_freeze_batches);
        tracing::debug!(
            target: "scriptsync::engine",
            engine = %self.id,
            at_ms = now_ms,
            freeze = self.rescue.freeze_batches,
            "manual scroll noted"
        );
    }

    /// Register a consumer for every emitted scroll command.
    pub fn add_sink(&mut self, sink: Box<dyn ScrollSink + Send>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn profile(&self) -> &TuningProfile {
        &self.profile
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn script(&self) -> Option<&ScriptIndex> {
        self.index.as_deref()
    }

    #[must_use]
    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    #[must_use]
    pub fn committed_index(&self) -> usize {
        self.alignment.committed_index
    }

    #[must_use]
    pub fn predicted_index(&self) -> usize {
        self.alignment.predicted_index
    }

    #[must_use]
    pub fn tracking_state(&self) -> TrackingState {
        self.tracking
    }

    #[must_use]
    pub fn is_rescue_active(&self) -> bool {
        self.rescue.active
    }

    #[must_use]
    pub fn catch_up_active(&self, now_ms: u64) -> bool {
        self.scroll.burst_active(now_ms)
    }

    #[must_use]
    pub fn bias_percent(&self) -> f64 {
        self.bias.bias_percent()
    }

    #[must_use]
    pub fn snapshot(&self, now_ms: u64) -> EngineSnapshot {
        EngineSnapshot {
            engine_id: self.id,
            enabled: self.enabled,
            script: self.index.as_ref().map(|index| index.summary(false)),
            alignment: self.alignment.clone(),
            rescue: self.rescue.clone(),
            jitter: self.jitter.summary(now_ms),
            tracking: self.tracking,
            bias: self.bias.state().clone(),
            profile: self.profile,
            layout_ready: self.readiness.outcome(),
            last_similarity: self.last_similarity,
        }
    }

    fn rescue_policy(&self) -> RescuePolicy {
        RescuePolicy {
            stall_ms: self.config.stall_ms,
            exit_ms: self.config.rescue_exit_ms,
            anchor_rate_limit_ms: self.config.anchor_rate_limit_ms,
        }
    }

    /// Enter or leave rescue mode based on time since the last commit.
    fn apply_rescue_policy(&mut self, now_ms: u64) {
        let since = self.alignment.since_commit_ms(now_ms);
        let mean = self.similarities.mean();
        match self.rescue_policy().evaluate(&mut self.rescue, now_ms, since, mean) {
            RescueTransition::Entered => tracing::info!(
                target: "scriptsync::rescue",
                engine = %self.id,
                since_commit_ms = since,
                mean_similarity = mean.unwrap_or_default(),
                "rescue entered"
            ),
            RescueTransition::Exited => {
                tracing::info!(target: "scriptsync::rescue", engine = %self.id, "rescue timed out");
            }
            RescueTransition::Unchanged => {}
        }
    }

    fn update_tracking(&mut self, now_ms: u64) {
        let since = self.alignment.since_commit_ms(now_ms);
        let mean = self.similarities.mean().unwrap_or(0.0);
        let next = if self.alignment.fallback_streak >= LOST_FALLBACK_STREAK
            || (since > self.config.lost_ms && mean < STALL_MEAN_SIMILARITY)
        {
            TrackingState::Lost
        } else if mean >= LOCKED_MEAN_SIMILARITY && since < self.config.stall_ms {
            TrackingState::Locked
        } else {
            TrackingState::Seeking
        };
        if next != self.tracking {
            tracing::debug!(
                target: "scriptsync::engine",
                engine = %self.id,
                from = ?self.tracking,
                to = ?next,
                "tracking changed"
            );
            self.tracking = next;
        }
    }

    /// Bookkeeping shared by every kind of commit.
    fn after_commit(&mut self, index: &ScriptIndex, is_final: bool, now_ms: u64) {
        let committed = self.alignment.committed_index;
        self.soft.observe(index.virtual_line_of(committed), now_ms);
        self.scroll.request(committed, is_final);
    }

    /// Reset every per-take record together.
    fn reset(&mut self, now_ms: u64) {
        self.alignment = AlignmentState::new(now_ms);
        self.rescue = RescueState::default();
        self.jitter = JitterState::default();
        self.similarities = SimilarityWindow::default();
        self.tracking = TrackingState::default();
        self.soft = SoftAdvanceState::new(now_ms);
        if let Some(index) = &self.index {
            self.soft.observe(index.virtual_line_of(0), now_ms);
        }
        self.watch = StallWatch::default();
        self.scroll.reset();
        self.bias.reset();
        self.spoken_tail.clear();
        self.last_interim_ms = None;
        self.last_speech_ms = None;
        self.pause_noted = false;
        self.last_similarity = 0.0;
    }
}
