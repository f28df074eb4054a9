//! Alignment pipeline stages, from candidate generation to soft-advance.
//!
//! Each stage is a pure function or a small state record; the engine owns the
//! state and runs the stages in order for every accepted batch.

pub mod candidates;
pub mod gates;
pub mod jitter;
pub mod rescue;
pub mod similarity;
pub mod soft_advance;
pub mod viterbi;

pub use candidates::{CandidateSet, SearchWindow};
pub use jitter::{JitterState, JitterSummary};
pub use rescue::{AnchorHit, RescuePolicy, RescueTransition, SimilarityWindow, StallWatch};
pub use similarity::{Scorer, SimilarityParts};
pub use soft_advance::{SoftAdvance, SoftAdvanceInput, SoftAdvanceState};
pub use viterbi::{ViterbiParams, ViterbiStep};
