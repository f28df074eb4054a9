//! Script records produced by the indexer.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One rendered paragraph of the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// Paragraph ordinal the renderer uses to address the element.
    pub element_ref: usize,
    /// First word index (inclusive).
    pub start: usize,
    /// Last word index (exclusive).
    pub end: usize,
    /// Normalized tokens joined by spaces; equal keys mean duplicate lines.
    pub key: String,
    /// Headers, scene directions, ALL-CAPS and bracket-only lines.
    pub is_non_spoken: bool,
    /// Short lines and lines sharing a templated prefix with another line.
    pub is_meta: bool,
    /// Character count of the raw paragraph text.
    pub char_len: usize,
}

impl LineRecord {
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(&self, word: usize) -> bool {
        (self.start..self.end).contains(&word)
    }
}

/// A run of consecutive short lines merged to phrase length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualLine {
    pub start: usize,
    pub end: usize,
    /// LineRecord indices merged into this virtual line.
    pub lines: Range<usize>,
    pub key: String,
    pub char_len: usize,
    pub is_non_spoken: bool,
}

impl VirtualLine {
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.end - self.start
    }
}

/// Summary returned after a script load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub tokens: usize,
    pub lines: usize,
    pub virtual_lines: usize,
    pub ngrams: usize,
    /// Hex blake3 fingerprint of the paragraph texts.
    pub fingerprint: String,
    /// True when the previous index was reused because the text was identical.
    pub reused: bool,
}
