//! Stall detection, rescue mode, anchor search and the forced-commit watchdog.

use std::collections::{HashSet, VecDeque};

use crate::align::similarity::Scorer;
use crate::constants::{
    ANCHOR_MAX_NEAR_JUMP, ANCHOR_MIN_SCORE, ANCHOR_RADIUS_DEFAULT, ANCHOR_RADIUS_LOCKED,
    ANCHOR_RADIUS_LOST, ANCHOR_STRONG_SCORE, MAX_ANCHORS, RESCUE_EXIT_LINE_JUMP,
    RESCUE_EXIT_SIMILARITY, SIMILARITY_WINDOW, STALL_MEAN_SIMILARITY,
};
use crate::index::ScriptIndex;
use crate::types::{RescueState, TrackingState};

const ANCHOR_GRAM: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "so", "to", "of", "in", "on", "at", "for", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "am", "it", "its", "this", "that",
    "these", "those", "i", "you", "we", "they", "he", "she", "me", "us", "them", "my", "your",
    "our", "their", "his", "her", "do", "does", "did", "have", "has", "had", "not", "no", "if",
    "then", "there", "here", "what", "which", "who", "will", "would", "can", "just",
];

#[must_use]
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Rolling mean over the last few batch similarities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityWindow {
    values: VecDeque<f64>,
}

impl SimilarityWindow {
    pub fn push(&mut self, similarity: f64) {
        if self.values.len() == SIMILARITY_WINDOW {
            self.values.pop_front();
        }
        self.values.push_back(similarity);
    }

    /// `None` until the first batch has been scored.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// No commit for longer than `stall_ms` while recent matches are weak.
#[must_use]
pub fn is_stalled(since_commit_ms: u64, mean_similarity: Option<f64>, stall_ms: u64) -> bool {
    since_commit_ms > stall_ms && mean_similarity.is_some_and(|mean| mean < STALL_MEAN_SIMILARITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueTransition {
    Entered,
    Exited,
    Unchanged,
}

/// Timing knobs for rescue mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescuePolicy {
    pub stall_ms: u64,
    pub exit_ms: u64,
    pub anchor_rate_limit_ms: u64,
}

impl RescuePolicy {
    /// Enter on a stall; leave once the rescue window has run out.
    pub fn evaluate(
        &self,
        state: &mut RescueState,
        now_ms: u64,
        since_commit_ms: u64,
        mean_similarity: Option<f64>,
    ) -> RescueTransition {
        if state.active {
            if now_ms.saturating_sub(state.entered_at_ms) >= self.exit_ms {
                state.active = false;
                return RescueTransition::Exited;
            }
            return RescueTransition::Unchanged;
        }
        if is_stalled(since_commit_ms, mean_similarity, self.stall_ms) {
            state.active = true;
            state.entered_at_ms = now_ms;
            return RescueTransition::Entered;
        }
        RescueTransition::Unchanged
    }

    /// Leave rescue after a clear multi-line jump.
    pub fn observe_progress(&self, state: &mut RescueState, line_jump: usize, similarity: f64) -> bool {
        if state.active && line_jump > RESCUE_EXIT_LINE_JUMP && similarity > RESCUE_EXIT_SIMILARITY {
            state.active = false;
            return true;
        }
        false
    }

    #[must_use]
    pub fn anchor_allowed(&self, state: &RescueState, now_ms: u64) -> bool {
        state
            .last_anchor_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.anchor_rate_limit_ms)
    }
}

/// Anchor band radius for the current tracking state.
#[must_use]
pub fn anchor_radius(tracking: TrackingState) -> usize {
    match tracking {
        TrackingState::Lost => ANCHOR_RADIUS_LOST,
        TrackingState::Locked => ANCHOR_RADIUS_LOCKED,
        TrackingState::Seeking => ANCHOR_RADIUS_DEFAULT,
    }
}

/// A rare 3-gram from the spoken batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub offset: usize,
    pub gram: String,
    pub rarity: f64,
}

/// Up to ten stop-word-free 3-grams of `batch`, rarest first.
#[must_use]
pub fn extract_anchors(batch: &[String], index: &ScriptIndex) -> Vec<Anchor> {
    let mut seen = HashSet::new();
    let mut anchors: Vec<Anchor> = batch
        .windows(ANCHOR_GRAM)
        .enumerate()
        .filter(|(_, window)| !window.iter().any(|t| is_stop_word(t)))
        .filter_map(|(offset, window)| {
            let gram = window.join(" ");
            if !seen.insert(gram.clone()) {
                return None;
            }
            let rarity = window.iter().map(|t| index.idf(t)).sum();
            Some(Anchor {
                offset,
                gram,
                rarity,
            })
        })
        .collect();
    anchors.sort_by(|a, b| b.rarity.total_cmp(&a.rarity).then(a.offset.cmp(&b.offset)));
    anchors.truncate(MAX_ANCHORS);
    anchors
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorHit {
    /// Candidate word index, aligned to the batch's last token.
    pub index: usize,
    pub score: f64,
    pub distance: usize,
}

impl AnchorHit {
    /// Strong enough to jump to.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.score > ANCHOR_MIN_SCORE
            && (self.score > ANCHOR_STRONG_SCORE || self.distance <= ANCHOR_MAX_NEAR_JUMP)
    }

    /// Close enough to vouch for a soft-advance while lost.
    #[must_use]
    pub fn is_near(&self) -> bool {
        self.distance <= ANCHOR_MAX_NEAR_JUMP
    }
}

/// Best-scoring exact anchor match within `radius` words of `center`.
#[must_use]
pub fn search_anchors(
    index: &ScriptIndex,
    batch: &[String],
    anchors: &[Anchor],
    center: usize,
    radius: usize,
) -> Option<AnchorHit> {
    let scorer = Scorer::new(index);
    let low = center.saturating_sub(radius);
    let high = center.saturating_add(radius);
    let last = batch.len().saturating_sub(1);
    let mut best: Option<AnchorHit> = None;
    for anchor in anchors {
        for &position in index.ngrams().positions(&anchor.gram) {
            let candidate = position + (last - anchor.offset);
            if candidate >= index.len() || !(low..=high).contains(&candidate) {
                continue;
            }
            let score = scorer.score(batch, candidate);
            if best.is_none_or(|b| score > b.score) {
                best = Some(AnchorHit {
                    index: candidate,
                    score,
                    distance: candidate.abs_diff(center),
                });
            }
        }
    }
    best
}

/// Watchdog bookkeeping for the forced commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StallWatch {
    committed: usize,
    predicted: usize,
    last_tick_ms: Option<u64>,
}

impl StallWatch {
    /// Whether a host tick at `now_ms` counts. Calls arriving well inside one
    /// interval of the last counted tick are coalesced.
    pub fn due(&mut self, now_ms: u64, interval_ms: u64) -> bool {
        let due = self
            .last_tick_ms
            .is_none_or(|last| now_ms.saturating_sub(last) * 10 >= interval_ms * 9);
        if due {
            self.last_tick_ms = Some(now_ms);
        }
        due
    }

    /// Count one tick. Returns the forced-commit target once `ticks_needed`
    /// consecutive ticks saw no movement with the prediction ahead.
    pub fn tick(
        &mut self,
        state: &mut RescueState,
        committed: usize,
        predicted: usize,
        ticks_needed: u32,
        max_jump: usize,
    ) -> Option<usize> {
        let unchanged = committed == self.committed && predicted == self.predicted;
        self.committed = committed;
        self.predicted = predicted;
        if !(unchanged && predicted > committed) {
            state.consecutive_stall_count = 0;
            return None;
        }
        state.consecutive_stall_count += 1;
        if state.consecutive_stall_count < ticks_needed {
            return None;
        }
        state.consecutive_stall_count = 0;
        let target = predicted.min(committed + max_jump);
        self.committed = target;
        Some(target)
    }
}
