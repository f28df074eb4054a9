//! Nudge forward when the current virtual line has clearly been read but the
//! matcher keeps holding on it.

use crate::align::similarity::SimilarityParts;
use crate::constants::{
    MIN_BATCH_TOKENS, SOFT_ADVANCE_CONSISTENCY_RELIEF, SOFT_ADVANCE_CONSISTENCY_STEPS,
    SOFT_ADVANCE_COVERAGE, SOFT_ADVANCE_LOST_MIN_SIMILARITY, SOFT_ADVANCE_LOST_STREAK_CAP,
    SOFT_ADVANCE_MIN_SIMILARITY, SOFT_ADVANCE_PROBE_LINES, SOFT_ADVANCE_STREAK_CAP,
};
use crate::index::ScriptIndex;
use crate::types::TrackingState;

/// Tokens compared when probing the start of a following line.
const PROBE_PREFIX_TOKENS: usize = 6;

/// Fraction of `line` found in order within `spoken`.
///
/// Line tokens that never appear are skipped, so one misheard word costs one
/// token of coverage instead of ending the scan.
#[must_use]
pub fn coverage(line: &[String], spoken: &[String]) -> f64 {
    if line.is_empty() {
        return 0.0;
    }
    let mut cursor = 0;
    let mut found = 0;
    for token in line {
        if let Some(pos) = spoken[cursor..].iter().position(|s| s == token) {
            cursor += pos + 1;
            found += 1;
        }
    }
    found as f64 / line.len() as f64
}

/// Per-engine soft-advance bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftAdvanceState {
    /// Virtual line holding the committed index.
    pub virtual_line: Option<usize>,
    pub virtual_line_since_ms: u64,
    /// Consecutive soft-advances without a regular commit in between.
    pub streak: u32,
}

impl SoftAdvanceState {
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            virtual_line: None,
            virtual_line_since_ms: now_ms,
            streak: 0,
        }
    }

    /// Track which virtual line the committed index sits on.
    pub fn observe(&mut self, virtual_line: Option<usize>, now_ms: u64) {
        if virtual_line != self.virtual_line {
            self.virtual_line = virtual_line;
            self.virtual_line_since_ms = now_ms;
        }
    }

    #[must_use]
    pub fn stagnant_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.virtual_line_since_ms)
    }
}

/// Everything the gate needs to know about the current batch.
#[derive(Debug, Clone, Copy)]
pub struct SoftAdvanceInput<'a> {
    pub batch: &'a [String],
    /// Finalized tail plus the live hypothesis.
    pub spoken: &'a [String],
    pub committed: usize,
    pub tracking: TrackingState,
    pub viterbi_consistency: u32,
    /// An n-gram seed or a near anchor backed this batch.
    pub has_evidence: bool,
    pub frozen: bool,
    pub now_ms: u64,
    pub stall_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftAdvance {
    pub virtual_line: usize,
    /// First word of the accepted virtual line.
    pub target: usize,
    pub similarity: f64,
}

fn min_similarity(tracking: TrackingState, consistency: u32) -> f64 {
    let base = if tracking == TrackingState::Lost {
        SOFT_ADVANCE_LOST_MIN_SIMILARITY
    } else {
        SOFT_ADVANCE_MIN_SIMILARITY
    };
    if consistency >= SOFT_ADVANCE_CONSISTENCY_STEPS {
        base - SOFT_ADVANCE_CONSISTENCY_RELIEF
    } else {
        base
    }
}

fn streak_cap(tracking: TrackingState) -> u32 {
    if tracking == TrackingState::Lost {
        SOFT_ADVANCE_LOST_STREAK_CAP
    } else {
        SOFT_ADVANCE_STREAK_CAP
    }
}

/// Best similarity of a batch suffix against the same number of opening
/// words of `line`.
fn prefix_similarity(batch: &[String], line: &[String]) -> f64 {
    let longest = batch.len().min(line.len()).min(PROBE_PREFIX_TOKENS);
    let shortest = MIN_BATCH_TOKENS.min(longest).max(1);
    (shortest..=longest)
        .map(|n| SimilarityParts::compute(&batch[batch.len() - n..], &line[..n]).weighted())
        .fold(0.0, f64::max)
}

/// Probe the virtual lines after the current one; `None` when any gate holds.
#[must_use]
pub fn attempt(
    index: &ScriptIndex,
    state: &SoftAdvanceState,
    input: &SoftAdvanceInput<'_>,
) -> Option<SoftAdvance> {
    if input.frozen || state.streak >= streak_cap(input.tracking) {
        return None;
    }
    if input.tracking == TrackingState::Lost && !input.has_evidence {
        return None;
    }
    if state.stagnant_ms(input.now_ms) < input.stall_ms {
        return None;
    }
    let current = index.virtual_line_of(input.committed)?;
    let vlines = index.virtual_lines();
    let line = &vlines[current];
    let tokens = &index.tokens()[line.start..line.end];
    if coverage(tokens, input.spoken) < SOFT_ADVANCE_COVERAGE {
        return None;
    }
    let threshold = min_similarity(input.tracking, input.viterbi_consistency);
    vlines
        .iter()
        .enumerate()
        .skip(current + 1)
        .take(SOFT_ADVANCE_PROBE_LINES)
        .filter(|(_, next)| !next.is_non_spoken)
        .find_map(|(idx, next)| {
            let similarity = prefix_similarity(input.batch, &index.tokens()[next.start..next.end]);
            (similarity > threshold).then_some(SoftAdvance {
                virtual_line: idx,
                target: next.start,
                similarity,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Script;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn index() -> ScriptIndex {
        ScriptIndex::build(&Script::from_text(
            "Every story begins with a single quiet moment of doubt.\n\
             Then the music rises and the lights come up slowly.\n\
             We follow the road north toward the mountains again.",
        ))
        .expect("index")
    }

    fn input<'a>(batch: &'a [String], spoken: &'a [String], now_ms: u64) -> SoftAdvanceInput<'a> {
        SoftAdvanceInput {
            batch,
            spoken,
            committed: 9,
            tracking: TrackingState::Seeking,
            viterbi_consistency: 0,
            has_evidence: true,
            frozen: false,
            now_ms,
            stall_ms: 1200,
        }
    }

    #[test]
    fn coverage_skips_missing_tokens() {
        let line = toks("a b c d");
        assert_eq!(coverage(&line, &toks("x a b c d y")), 1.0);
        assert_eq!(coverage(&line, &toks("a c d")), 0.75);
        assert_eq!(coverage(&line, &toks("d c b a")), 0.25);
        assert_eq!(coverage(&[], &toks("a")), 0.0);
    }

    #[test]
    fn advances_to_next_line_start() {
        let index = index();
        let spoken = toks("every story begins with a single quiet moment of doubt then the music");
        let batch = toks("moment of doubt then the music");
        let mut state = SoftAdvanceState::new(0);
        state.observe(index.virtual_line_of(9), 0);

        assert!(attempt(&index, &state, &input(&batch, &spoken, 1199)).is_none());

        let advance = attempt(&index, &state, &input(&batch, &spoken, 1200)).expect("advance");
        assert_eq!(advance.virtual_line, 1);
        assert_eq!(advance.target, index.virtual_lines()[1].start);
    }

    #[test]
    fn gates_hold_the_advance() {
        let index = index();
        let spoken = toks("every story begins with a single quiet moment of doubt then the music");
        let batch = toks("moment of doubt then the music");
        let mut state = SoftAdvanceState::new(0);
        state.observe(index.virtual_line_of(9), 0);

        let frozen = SoftAdvanceInput { frozen: true, ..input(&batch, &spoken, 5000) };
        assert!(attempt(&index, &state, &frozen).is_none());

        let lost = SoftAdvanceInput {
            tracking: TrackingState::Lost,
            has_evidence: false,
            ..input(&batch, &spoken, 5000)
        };
        assert!(attempt(&index, &state, &lost).is_none());

        let partial = toks("every story begins then the music");
        assert!(attempt(&index, &state, &input(&batch, &partial, 5000)).is_none());

        state.streak = SOFT_ADVANCE_STREAK_CAP;
        assert!(attempt(&index, &state, &input(&batch, &spoken, 5000)).is_none());
    }

    #[test]
    fn consistency_relaxes_threshold() {
        assert!((min_similarity(TrackingState::Seeking, 0) - 0.54).abs() < 1e-12);
        assert!((min_similarity(TrackingState::Seeking, 3) - 0.50).abs() < 1e-12);
        assert!((min_similarity(TrackingState::Lost, 0) - 0.62).abs() < 1e-12);
        assert_eq!(streak_cap(TrackingState::Lost), 1);
    }
}
