//! Watchdog tick and per-frame scroll output.

use serde::{Deserialize, Serialize};

use crate::constants::BREATHING_PAUSE_MS;
use crate::index::ScriptIndex;
use crate::types::{
    BatchOutcome, CommitKind, LayoutProvider, ScrollCommand, TrackingState, ViewportSnapshot,
};

use super::{SyncEngine, WaitOutcome};

/// What one watchdog tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// The forced commit, when the watchdog fired.
    pub forced_commit: Option<BatchOutcome>,
    pub rescue_active: bool,
    pub tracking: TrackingState,
    /// Set only on the tick that resolved the layout wait.
    pub layout_ready: Option<WaitOutcome>,
}

impl<L: LayoutProvider> SyncEngine<L> {
    /// Periodic upkeep: layout readiness, jitter decay, stall detection and
    /// the forced commit.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        if !self.enabled {
            return TickReport::default();
        }
        let Some(index) = self.index.clone() else {
            return TickReport::default();
        };

        let layout = &self.layout;
        let layout_ready = self.readiness.poll(now_ms, || !layout.lines().is_empty());
        match layout_ready {
            Some(WaitOutcome::Ready) => {
                tracing::debug!(target: "scriptsync::engine", engine = %self.id, "layout ready");
            }
            Some(WaitOutcome::TimedOut) => tracing::warn!(
                target: "scriptsync::engine",
                engine = %self.id,
                "layout not ready, scrolling by estimate"
            ),
            None => {}
        }

        self.jitter.decay(now_ms);
        self.apply_rescue_policy(now_ms);
        self.update_tracking(now_ms);

        let forced_commit = if self.watch.due(now_ms, self.config.tick_interval_ms) {
            self.watchdog(&index, now_ms)
        } else {
            None
        };

        if self.profile.hybrid_lock
            && !self.pause_noted
            && self
                .last_speech_ms
                .is_some_and(|last| now_ms.saturating_sub(last) >= BREATHING_PAUSE_MS)
        {
            self.bias.note_pause(now_ms);
            self.pause_noted = true;
        }

        TickReport {
            forced_commit,
            rescue_active: self.rescue.active,
            tracking: self.tracking,
            layout_ready,
        }
    }

    /// Count one watchdog tick and force the predicted index once the
    /// committed index has sat still for long enough.
    fn watchdog(&mut self, index: &ScriptIndex, now_ms: u64) -> Option<BatchOutcome> {
        let target = self.watch.tick(
            &mut self.rescue,
            self.alignment.committed_index,
            self.alignment.predicted_index,
            self.config.forced_commit_ticks,
            self.profile.matching().max_jump_ahead_words,
        )?;
        let from = self.alignment.committed_index;
        if !self.alignment.commit(target, now_ms) {
            return None;
        }
        self.scroll.start_burst(now_ms, self.config.catch_up_burst_ms);
        self.after_commit(index, true, now_ms);
        tracing::info!(
            target: "scriptsync::rescue",
            engine = %self.id,
            from,
            to = target,
            "forced commit"
        );
        Some(BatchOutcome::Committed {
            from,
            to: target,
            similarity: self.last_similarity,
            kind: CommitKind::Forced,
        })
    }

    /// At most one scroll command per display frame, delivered to every
    /// sink. Nothing is emitted until the layout wait has resolved.
    pub fn frame(&mut self, now_ms: u64) -> Option<ScrollCommand> {
        if !self.enabled || !self.readiness.is_resolved() {
            return None;
        }
        let total_words = self.index.as_ref()?.len();
        let snapshot = ViewportSnapshot::capture(&self.layout);
        let profile = self.profile;
        let offset = if profile.hybrid_lock {
            self.bias.tick(now_ms, BREATHING_PAUSE_MS, &profile.pid);
            self.scroll
                .hybrid_step(now_ms, &snapshot, total_words, &profile, &self.bias)?
        } else {
            self.scroll
                .correction(now_ms, &snapshot, total_words, &profile)?
        };

        let command = ScrollCommand {
            offset,
            ratio: snapshot.scroll_ratio(offset),
            sequence: self.scroll.next_sequence(),
            timestamp_ms: now_ms,
            source: self.id,
        };
        for sink in &mut self.sinks {
            sink.apply(&command);
        }
        tracing::trace!(
            target: "scriptsync::scroll",
            engine = %self.id,
            offset,
            sequence = command.sequence,
            "scroll command"
        );
        Some(command)
    }
}
