//! Transcript handling: batching, rejection gates and one alignment step.

use crate::align::candidates::{self, CandidateSet, SearchWindow};
use crate::align::{AnchorHit, Scorer, SoftAdvanceInput, ViterbiParams, gates, rescue, soft_advance, viterbi};
use crate::constants::{
    ANCHOR_FREEZE_BATCHES, MIN_BATCH_TOKENS, RESCUE_MIN_AHEAD, SPOKEN_TAIL_CAPACITY,
};
use crate::index::ScriptIndex;
use crate::text::{normalize_tokens, truncate_at_grapheme_boundary};
use crate::types::{
    BatchOutcome, CommitKind, DropReason, LayoutProvider, TranscriptEvent, ViewportSnapshot,
};

use super::SyncEngine;

/// Graphemes of transcript text carried on rejection logs.
const LOG_PREVIEW_GRAPHEMES: usize = 48;

/// Per-batch inputs threaded through the alignment step.
struct Batch<'a> {
    tokens: &'a [String],
    spoken: &'a [String],
    is_final: bool,
    frozen: bool,
    now_ms: u64,
}

impl<L: LayoutProvider> SyncEngine<L> {
    /// Feed one recognizer event. Runs to completion; the returned outcome
    /// says whether the committed index moved.
    pub fn handle_transcript(&mut self, event: &TranscriptEvent, now_ms: u64) -> BatchOutcome {
        if !self.enabled {
            return BatchOutcome::dropped(DropReason::Disabled);
        }
        let Some(index) = self.index.clone() else {
            return BatchOutcome::dropped(DropReason::NoScript);
        };
        if !event.is_final {
            let throttle = self.config.interim_throttle_ms;
            if throttle > 0
                && self
                    .last_interim_ms
                    .is_some_and(|last| now_ms.saturating_sub(last) < throttle)
            {
                return BatchOutcome::dropped(DropReason::Throttled);
            }
            self.last_interim_ms = Some(now_ms);
        }

        let tokens = normalize_tokens(&event.text);
        if tokens.is_empty() {
            return BatchOutcome::dropped(DropReason::TooShort);
        }
        self.last_speech_ms = Some(now_ms);
        self.pause_noted = false;

        let mut spoken: Vec<String> = self.spoken_tail.iter().cloned().collect();
        spoken.extend(tokens.iter().cloned());
        if event.is_final {
            for token in tokens {
                if self.spoken_tail.len() == SPOKEN_TAIL_CAPACITY {
                    self.spoken_tail.pop_front();
                }
                self.spoken_tail.push_back(token);
            }
        }

        let window = self.config.batch_window_tokens.min(spoken.len());
        let batch = &spoken[spoken.len() - window..];
        if batch.len() < MIN_BATCH_TOKENS {
            return BatchOutcome::dropped(DropReason::TooShort);
        }
        if let Some(reason) = gates::reject(batch, &index) {
            tracing::debug!(
                target: "scriptsync::engine",
                engine = %self.id,
                ?reason,
                tokens = batch.len(),
                text = truncate_at_grapheme_boundary(&event.text, LOG_PREVIEW_GRAPHEMES),
                "batch rejected"
            );
            return BatchOutcome::dropped(reason);
        }

        let frozen = self.rescue.freeze_batches > 0;
        if frozen {
            self.rescue.freeze_batches -= 1;
        }
        let batch = Batch {
            tokens: batch,
            spoken: &spoken,
            is_final: event.is_final,
            frozen,
            now_ms,
        };
        self.align_batch(&index, &batch)
    }

    fn align_batch(&mut self, index: &ScriptIndex, batch: &Batch<'_>) -> BatchOutcome {
        let now_ms = batch.now_ms;
        self.apply_rescue_policy(now_ms);

        let matching = self.profile.matching();
        let previous = self.alignment.predicted_index;
        let ahead = if self.rescue.active {
            matching.window_ahead.max(RESCUE_MIN_AHEAD)
        } else {
            matching.window_ahead
        };
        let candidates = candidates::generate(
            index,
            batch.tokens,
            SearchWindow {
                center: previous,
                back: matching.window_back,
                ahead,
            },
        );
        if candidates.seeded {
            self.alignment.fallback_streak = 0;
        } else {
            self.alignment.fallback_streak += 1;
        }

        let (predicted, similarity) = self.predict(index, batch.tokens, &candidates, previous);
        let motion = self.profile.motion();
        let agrees = predicted >= previous && predicted - previous <= motion.max_commit_step;
        self.alignment.stable_hits = if agrees {
            self.alignment.stable_hits + 1
        } else {
            1
        };
        self.alignment.push_prediction(predicted);
        self.similarities.push(similarity);
        self.last_similarity = similarity;
        self.jitter
            .record(now_ms, predicted as f64 - self.alignment.committed_index as f64);
        self.update_tracking(now_ms);
        self.observe_bias(index, predicted, similarity, now_ms);

        tracing::trace!(
            target: "scriptsync::align",
            engine = %self.id,
            candidates = candidates.len(),
            seeded = candidates.seeded,
            predicted,
            similarity,
            "batch aligned"
        );

        let mut anchor_near = false;
        if self.rescue.active && self.rescue_policy().anchor_allowed(&self.rescue, now_ms) {
            let anchors = rescue::extract_anchors(batch.tokens, index);
            let radius = rescue::anchor_radius(self.tracking);
            if let Some(hit) = rescue::search_anchors(index, batch.tokens, &anchors, previous, radius) {
                anchor_near = hit.is_near();
                if hit.is_acceptable() {
                    return self.accept_anchor(index, hit, batch);
                }
                tracing::debug!(
                    target: "scriptsync::rescue",
                    engine = %self.id,
                    index = hit.index,
                    score = hit.score,
                    distance = hit.distance,
                    "anchor rejected"
                );
            }
        }

        let threshold = matching.similarity_threshold + self.jitter.threshold_bump(now_ms);
        if similarity >= threshold && predicted > self.alignment.committed_index {
            if let Some(outcome) = self.commit_match(index, predicted, similarity, batch) {
                return outcome;
            }
        }

        let input = SoftAdvanceInput {
            batch: batch.tokens,
            spoken: batch.spoken,
            committed: self.alignment.committed_index,
            tracking: self.tracking,
            viterbi_consistency: self.alignment.viterbi_consistency,
            has_evidence: candidates.seeded || anchor_near,
            frozen: batch.frozen,
            now_ms,
            stall_ms: self.config.soft_advance_stall_ms,
        };
        if let Some(advance) = soft_advance::attempt(index, &self.soft, &input) {
            let from = self.alignment.committed_index;
            if self.alignment.commit(advance.target, now_ms) {
                self.soft.streak += 1;
                self.after_commit(index, batch.is_final, now_ms);
                tracing::info!(
                    target: "scriptsync::align",
                    engine = %self.id,
                    from,
                    to = advance.target,
                    virtual_line = advance.virtual_line,
                    similarity = advance.similarity,
                    streak = self.soft.streak,
                    "soft advance"
                );
                return BatchOutcome::Committed {
                    from,
                    to: advance.target,
                    similarity: advance.similarity,
                    kind: CommitKind::SoftAdvance,
                };
            }
        }

        BatchOutcome::Held {
            predicted,
            similarity,
        }
    }

    /// Viterbi winner and its raw score, or a viewport estimate with zero
    /// confidence when there is nothing to score.
    fn predict(
        &self,
        index: &ScriptIndex,
        batch: &[String],
        candidates: &CandidateSet,
        previous: usize,
    ) -> (usize, f64) {
        let scorer = Scorer::new(index);
        let scored: Vec<(usize, f64)> = candidates
            .indices
            .iter()
            .map(|&candidate| (candidate, scorer.score(batch, candidate)))
            .collect();
        let params = if self.rescue.active {
            ViterbiParams::default().relaxed()
        } else {
            ViterbiParams::default()
        };
        match viterbi::step(&scored, previous, params) {
            Some(step) => (step.index, step.score),
            None => {
                let estimate = self.viewport_estimate(index).unwrap_or(previous);
                tracing::debug!(
                    target: "scriptsync::align",
                    engine = %self.id,
                    estimate,
                    "no candidates, using viewport estimate"
                );
                (estimate, 0.0)
            }
        }
    }

    /// First word of the line under the marker, or the same position by
    /// scroll progress when the provider has no line geometry.
    fn viewport_estimate(&self, index: &ScriptIndex) -> Option<usize> {
        let snapshot = ViewportSnapshot::capture(&self.layout);
        let marker_y = snapshot.scroll_offset + snapshot.viewport_height * self.profile.marker_percent;
        if let Some(line) = snapshot.line_at_y(marker_y) {
            return Some(line.token_range.start.min(index.last_index()));
        }
        if snapshot.content_height <= 0.0 {
            return None;
        }
        let progress = (marker_y / snapshot.content_height).clamp(0.0, 1.0);
        let word = (progress * index.len() as f64) as usize;
        Some(word.min(index.last_index()))
    }

    fn accept_anchor(&mut self, index: &ScriptIndex, hit: AnchorHit, batch: &Batch<'_>) -> BatchOutcome {
        let now_ms = batch.now_ms;
        let from = self.alignment.committed_index;
        self.alignment.push_prediction(hit.index);
        if !self.alignment.commit(hit.index, now_ms) {
            tracing::debug!(
                target: "scriptsync::rescue",
                engine = %self.id,
                index = hit.index,
                committed = from,
                "anchor behind committed index"
            );
            return BatchOutcome::Held {
                predicted: hit.index,
                similarity: hit.score,
            };
        }
        self.rescue.last_anchor_ms = Some(now_ms);
        self.rescue.freeze_batches = ANCHOR_FREEZE_BATCHES;
        self.soft.streak = 0;
        let line_jump = line_distance(index, from, hit.index);
        if self
            .rescue_policy()
            .observe_progress(&mut self.rescue, line_jump, hit.score)
        {
            tracing::info!(target: "scriptsync::rescue", engine = %self.id, line_jump, "rescue exited on progress");
        }
        self.after_commit(index, batch.is_final, now_ms);
        tracing::info!(
            target: "scriptsync::rescue",
            engine = %self.id,
            from,
            to = hit.index,
            score = hit.score,
            distance = hit.distance,
            "anchor jump"
        );
        BatchOutcome::Committed {
            from,
            to: hit.index,
            similarity: hit.score,
            kind: CommitKind::Anchor,
        }
    }

    /// Apply the duplicate-line, strict-forward and hysteresis gates to a
    /// forward match. `None` means the match was held.
    fn commit_match(
        &mut self,
        index: &ScriptIndex,
        predicted: usize,
        similarity: f64,
        batch: &Batch<'_>,
    ) -> Option<BatchOutcome> {
        let matching = self.profile.matching();
        let motion = self.profile.motion();
        let from = self.alignment.committed_index;
        let jump = predicted - from;

        let duplicate = index
            .line_of(predicted)
            .is_some_and(|line| index.key_frequency(line) >= 2);
        if duplicate && jump > matching.max_jump_ahead_words {
            tracing::debug!(
                target: "scriptsync::align",
                engine = %self.id,
                predicted,
                jump,
                "held jump onto repeated line"
            );
            return None;
        }

        let mut target = predicted;
        if similarity < matching.strict_forward_similarity {
            target = target.min(from + matching.max_jump_ahead_words);
        }
        if !batch.is_final {
            if self.alignment.stable_hits < motion.stable_hits {
                return None;
            }
            target = target.min(from + motion.max_commit_step);
        }
        if !self.alignment.commit(target, batch.now_ms) {
            return None;
        }

        self.soft.streak = 0;
        let line_jump = line_distance(index, from, target);
        if self
            .rescue_policy()
            .observe_progress(&mut self.rescue, line_jump, similarity)
        {
            tracing::info!(target: "scriptsync::rescue", engine = %self.id, line_jump, "rescue exited on progress");
        }
        self.after_commit(index, batch.is_final, batch.now_ms);
        tracing::debug!(
            target: "scriptsync::align",
            engine = %self.id,
            from,
            to = target,
            similarity,
            is_final = batch.is_final,
            "committed"
        );
        Some(BatchOutcome::Committed {
            from,
            to: target,
            similarity,
            kind: CommitKind::Match,
        })
    }

    /// Feed the lead/lag of the matched line to the bias loop.
    fn observe_bias(&mut self, index: &ScriptIndex, word: usize, confidence: f64, now_ms: u64) {
        if !self.profile.hybrid_lock {
            return;
        }
        let snapshot = ViewportSnapshot::capture(&self.layout);
        let Some(top) = snapshot.estimate_top(word, index.len()) else {
            return;
        };
        let marker_y = snapshot.viewport_height * self.profile.marker_percent;
        let error_px = (top - snapshot.scroll_offset) - marker_y;
        let progress = word as f64 / index.len().max(1) as f64;
        self.bias
            .observe(now_ms, error_px, confidence, progress, &self.profile.pid);
    }
}

fn line_distance(index: &ScriptIndex, from: usize, to: usize) -> usize {
    match (index.line_of(from), index.line_of(to)) {
        (Some(a), Some(b)) => a.abs_diff(b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::index::Script;
    use crate::types::StaticLayout;

    fn engine() -> SyncEngine<StaticLayout> {
        let mut engine = SyncEngine::new(StaticLayout::default(), EngineConfig::default()).expect("engine");
        engine
            .load_script(
                &Script::from_text("one two three four five six seven eight nine ten eleven twelve"),
                0,
            )
            .expect("summary");
        engine
    }

    fn batch(now_ms: u64) -> Batch<'static> {
        Batch {
            tokens: &[],
            spoken: &[],
            is_final: true,
            frozen: false,
            now_ms,
        }
    }

    #[test]
    fn anchor_behind_commit_spends_nothing() {
        let mut engine = engine();
        let index = engine.index.clone().expect("index");
        engine.handle_transcript(&TranscriptEvent::final_text("six seven eight"), 100);
        assert_eq!(engine.committed_index(), 7);

        let behind = AnchorHit { index: 3, score: 0.9, distance: 4 };
        let outcome = engine.accept_anchor(&index, behind, &batch(200));
        assert!(matches!(outcome, BatchOutcome::Held { predicted: 3, .. }), "{outcome:?}");
        assert_eq!(engine.rescue.last_anchor_ms, None);
        assert_eq!(engine.rescue.freeze_batches, 0);
        assert!(engine.rescue_policy().anchor_allowed(&engine.rescue, 300));

        let ahead = AnchorHit { index: 10, score: 0.9, distance: 7 };
        let outcome = engine.accept_anchor(&index, ahead, &batch(300));
        assert!(
            matches!(outcome, BatchOutcome::Committed { from: 7, to: 10, kind: CommitKind::Anchor, .. }),
            "{outcome:?}"
        );
        assert_eq!(engine.rescue.last_anchor_ms, Some(300));
        assert_eq!(engine.rescue.freeze_batches, ANCHOR_FREEZE_BATCHES);
    }
}
