//! Transcript events delivered by the speech-to-text collaborator.

use serde::{Deserialize, Serialize};

/// A recognizer hypothesis. Interim events replace each other until a final
/// event closes the utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    #[serde(default, rename = "isFinal", alias = "is_final")]
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Why a batch was dropped before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Disabled,
    NoScript,
    Throttled,
    TooShort,
    OutOfVocabulary,
    FillerSpeech,
}

/// How a commit was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    Match,
    Anchor,
    SoftAdvance,
    Forced,
}

/// Result of feeding one transcript event to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Dropped {
        reason: DropReason,
    },
    /// Alignment ran but the committed index did not move.
    Held {
        predicted: usize,
        similarity: f64,
    },
    Committed {
        from: usize,
        to: usize,
        similarity: f64,
        kind: CommitKind,
    },
}

impl BatchOutcome {
    #[must_use]
    pub fn dropped(reason: DropReason) -> Self {
        Self::Dropped { reason }
    }

    #[must_use]
    pub fn is_commit(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}
