//! Single-state Viterbi step over scored candidates.

use crate::constants::{VITERBI_ALPHA, VITERBI_BETA, VITERBI_JUMP_SCALE, VITERBI_LOOP_PENALTY};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViterbiParams {
    /// Transition penalty weight.
    pub alpha: f64,
    /// Emission discount.
    pub beta: f64,
    /// Multiplicative bonus for staying on the previous index.
    pub loop_penalty: f64,
}

impl Default for ViterbiParams {
    fn default() -> Self {
        Self {
            alpha: VITERBI_ALPHA,
            beta: VITERBI_BETA,
            loop_penalty: VITERBI_LOOP_PENALTY,
        }
    }
}

impl ViterbiParams {
    /// Rescue mode halves the emission discount.
    #[must_use]
    pub fn relaxed(self) -> Self {
        Self {
            beta: self.beta / 2.0,
            ..self
        }
    }

    #[must_use]
    pub fn adjust(&self, candidate: usize, score: f64, previous: usize) -> f64 {
        let jump = candidate.abs_diff(previous) as f64;
        let mut adjusted =
            score * (1.0 - self.beta) - (jump / VITERBI_JUMP_SCALE).min(1.0) * self.alpha;
        if candidate == previous {
            adjusted *= 1.0 + self.loop_penalty;
        }
        adjusted
    }
}

/// Winner of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViterbiStep {
    pub index: usize,
    /// Raw similarity of the winner, before emission and transition terms.
    pub score: f64,
    pub adjusted: f64,
}

/// Pick the best `(candidate, score)` pair relative to `previous`.
///
/// Candidates must be in ascending order; ties keep the earliest.
#[must_use]
pub fn step(scored: &[(usize, f64)], previous: usize, params: ViterbiParams) -> Option<ViterbiStep> {
    let mut best: Option<ViterbiStep> = None;
    for &(index, score) in scored {
        let adjusted = params.adjust(index, score, previous);
        if best.is_none_or(|current| adjusted > current.adjusted) {
            best = Some(ViterbiStep {
                index,
                score,
                adjusted,
            });
        }
    }
    best
}
