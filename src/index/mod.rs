//! Script indexing: word positions, line table, virtual lines, n-gram
//! postings, and per-line document frequency.
//!
//! An index is built in full from a script and is read-only afterwards. A new
//! script produces a new index; nothing is patched in place.

mod frequency;
mod ngram;
mod virtual_lines;

use std::collections::{HashMap, HashSet};

pub use frequency::DocumentFrequencyMap;
pub use ngram::{NGRAM_SIZES, NGramIndex, batch_grams};
pub use virtual_lines::build_virtual_lines;

use crate::constants::{META_MAX_TOKENS, SIGNATURE_TOKENS};
use crate::text::{name_like_tokens, normalize_tokens};
use crate::types::{LineRecord, ScriptSummary, VirtualLine};

const DIRECTION_PREFIXES: [&str; 7] = [
    "int.", "ext.", "scene ", "cut to", "fade in", "fade out", "transition:",
];

/// Script text split into the paragraphs the renderer draws.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    paragraphs: Vec<String>,
}

impl Script {
    /// One paragraph per non-blank line.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_paragraphs(text.lines())
    }

    pub fn from_paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paragraphs: paragraphs
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    #[must_use]
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for paragraph in &self.paragraphs {
            hasher.update(paragraph.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }
}

/// Headers, bracketed directions, ALL-CAPS lines and scene markers.
#[must_use]
pub fn is_non_spoken_text(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return true;
    }
    let bracketed = [('[', ']'), ('(', ')'), ('{', '}'), ('<', '>')]
        .iter()
        .any(|&(open, close)| trimmed.starts_with(open) && trimmed.ends_with(close));
    if bracketed {
        return true;
    }
    let lower = trimmed.to_lowercase();
    if DIRECTION_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return true;
    }
    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    // Caseless scripts have no lowercase either; require real capitals.
    letters.len() >= 2
        && letters.iter().any(|c| c.is_uppercase())
        && letters.iter().all(|c| !c.is_lowercase())
}

/// Opening words of `line`; lines sharing one are templated repeats.
fn signature<'a>(tokens: &'a [String], line: &LineRecord) -> Option<&'a [String]> {
    (line.token_count() >= SIGNATURE_TOKENS).then(|| &tokens[line.start..line.start + SIGNATURE_TOKENS])
}

#[derive(Debug, Clone)]
pub struct ScriptIndex {
    tokens: Vec<String>,
    name_like: Vec<bool>,
    lines: Vec<LineRecord>,
    virtual_lines: Vec<VirtualLine>,
    ngrams: NGramIndex,
    frequency: DocumentFrequencyMap,
    key_counts: HashMap<String, usize>,
    vocabulary: HashSet<String>,
    fingerprint: blake3::Hash,
}

impl ScriptIndex {
    /// Index `script`. Returns `None` when it has no speakable tokens.
    #[must_use]
    pub fn build(script: &Script) -> Option<Self> {
        let mut tokens = Vec::new();
        let mut name_like = Vec::new();
        let mut lines = Vec::with_capacity(script.paragraphs.len());

        for (element_ref, paragraph) in script.paragraphs.iter().enumerate() {
            let words = normalize_tokens(paragraph);
            let names = name_like_tokens(paragraph);
            let start = tokens.len();
            name_like.extend(words.iter().map(|w| names.contains(w)));
            let key = words.join(" ");
            tokens.extend(words);
            lines.push(LineRecord {
                element_ref,
                start,
                end: tokens.len(),
                key,
                is_non_spoken: is_non_spoken_text(paragraph),
                is_meta: false,
                char_len: paragraph.chars().count(),
            });
        }

        if tokens.is_empty() {
            return None;
        }

        let mut key_counts: HashMap<String, usize> = HashMap::new();
        let mut signature_counts: HashMap<&[String], usize> = HashMap::new();
        for line in lines.iter().filter(|line| line.token_count() > 0) {
            *key_counts.entry(line.key.clone()).or_default() += 1;
            if let Some(signature) = signature(&tokens, line) {
                *signature_counts.entry(signature).or_default() += 1;
            }
        }
        let meta: Vec<bool> = lines
            .iter()
            .map(|line| {
                let repeated_prefix = signature(&tokens, line)
                    .and_then(|signature| signature_counts.get(signature))
                    .is_some_and(|&n| n >= 2);
                line.token_count() <= META_MAX_TOKENS || repeated_prefix
            })
            .collect();
        for (line, is_meta) in lines.iter_mut().zip(meta) {
            line.is_meta = is_meta;
        }

        let virtual_lines = build_virtual_lines(&tokens, &lines);
        let ngrams = NGramIndex::build(&tokens, &lines);
        let frequency = DocumentFrequencyMap::build(&tokens, &lines);
        let vocabulary = tokens.iter().cloned().collect();

        let index = Self {
            tokens,
            name_like,
            lines,
            virtual_lines,
            ngrams,
            frequency,
            key_counts,
            vocabulary,
            fingerprint: script.fingerprint(),
        };
        tracing::debug!(
            target: "scriptsync::index",
            tokens = index.tokens.len(),
            lines = index.lines.len(),
            virtual_lines = index.virtual_lines.len(),
            ngrams = index.ngrams.len(),
            "script indexed"
        );
        Some(index)
    }

    #[must_use]
    pub fn summary(&self, reused: bool) -> ScriptSummary {
        ScriptSummary {
            tokens: self.tokens.len(),
            lines: self.lines.len(),
            virtual_lines: self.virtual_lines.len(),
            ngrams: self.ngrams.len(),
            fingerprint: self.fingerprint.to_hex().to_string(),
            reused,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.tokens.len().saturating_sub(1)
    }

    #[must_use]
    pub fn is_name_like(&self, word: usize) -> bool {
        self.name_like.get(word).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn lines(&self) -> &[LineRecord] {
        &self.lines
    }

    #[must_use]
    pub fn virtual_lines(&self) -> &[VirtualLine] {
        &self.virtual_lines
    }

    #[must_use]
    pub fn ngrams(&self) -> &NGramIndex {
        &self.ngrams
    }

    #[must_use]
    pub fn frequency(&self) -> &DocumentFrequencyMap {
        &self.frequency
    }

    #[must_use]
    pub fn fingerprint(&self) -> blake3::Hash {
        self.fingerprint
    }

    #[must_use]
    pub fn idf(&self, token: &str) -> f64 {
        self.frequency.idf(token)
    }

    #[must_use]
    pub fn in_vocabulary(&self, token: &str) -> bool {
        self.vocabulary.contains(token)
    }

    /// Index of the line holding `word`.
    #[must_use]
    pub fn line_of(&self, word: usize) -> Option<usize> {
        let idx = self.lines.partition_point(|line| line.end <= word);
        self.lines
            .get(idx)
            .filter(|line| line.contains(word))
            .map(|_| idx)
    }

    #[must_use]
    pub fn line_record_of(&self, word: usize) -> Option<&LineRecord> {
        self.line_of(word).map(|idx| &self.lines[idx])
    }

    /// Index of the virtual line holding `word`.
    #[must_use]
    pub fn virtual_line_of(&self, word: usize) -> Option<usize> {
        let idx = self.virtual_lines.partition_point(|vline| vline.end <= word);
        self.virtual_lines
            .get(idx)
            .filter(|vline| (vline.start..vline.end).contains(&word))
            .map(|_| idx)
    }

    /// How many token-bearing lines share this line's key.
    #[must_use]
    pub fn key_frequency(&self, line: usize) -> usize {
        self.lines
            .get(line)
            .and_then(|record| self.key_counts.get(&record.key))
            .copied()
            .unwrap_or(0)
    }

    /// Script window of `len` words ending at `end_word` (inclusive).
    #[must_use]
    pub fn window_ending_at(&self, end_word: usize, len: usize) -> &[String] {
        let end = (end_word + 1).min(self.tokens.len());
        let start = end.saturating_sub(len);
        &self.tokens[start..end]
    }

    /// Start word of the window returned by [`Self::window_ending_at`].
    #[must_use]
    pub fn window_start(&self, end_word: usize, len: usize) -> usize {
        (end_word + 1).min(self.tokens.len()).saturating_sub(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScriptIndex {
        let script = Script::from_text(
            "# Opening\n\
             Welcome back to the show, everyone, and thanks for joining Maria tonight.\n\
             \n\
             [APPLAUSE]\n\
             Tonight we talk about rivers and the cities built along them.\n\
             Thanks for watching.\n\
             Tonight we talk about mountains and the towns built below them.\n",
        );
        ScriptIndex::build(&script).expect("index")
    }

    #[test]
    fn assigns_contiguous_ranges() {
        let index = sample();
        let mut next = 0;
        for line in index.lines() {
            assert_eq!(line.start, next);
            next = line.end;
        }
        assert_eq!(next, index.len());
        assert_eq!(index.lines().len(), 6);
    }

    #[test]
    fn classifies_headers_directions_and_meta() {
        let index = sample();
        let lines = index.lines();
        assert!(lines[0].is_non_spoken, "markdown header");
        assert!(lines[2].is_non_spoken, "bracketed direction");
        assert!(!lines[1].is_non_spoken);
        assert!(!lines[1].is_meta);
        // "thanks for watching" is short; the two "tonight we talk about" lines share a prefix.
        assert!(lines[4].is_meta);
        assert!(lines[3].is_meta);
        assert!(lines[5].is_meta);
    }

    #[test]
    fn non_spoken_detection() {
        assert!(is_non_spoken_text("INT. KITCHEN - NIGHT"));
        assert!(is_non_spoken_text("(beat)"));
        assert!(is_non_spoken_text("HOST:"));
        assert!(is_non_spoken_text("Cut to black"));
        assert!(!is_non_spoken_text("A normal sentence."));
        assert!(!is_non_spoken_text("I"));
    }

    #[test]
    fn caseless_scripts_are_spoken() {
        assert!(!is_non_spoken_text("שלום לכולם וברוכים הבאים"));
        assert!(!is_non_spoken_text("今天我们回顾这一年"));

        let script = Script::from_text("שלום לכולם וברוכים הבאים לתוכנית
הערב נדבר על השנה שעברה");
        let index = ScriptIndex::build(&script).expect("index");
        assert!(index.lines().iter().all(|line| !line.is_non_spoken));
        assert!(!index.ngrams().is_empty());
    }

    #[test]
    fn lookups_by_word() {
        let index = sample();
        let first_spoken = index.lines()[1].start;
        assert_eq!(index.line_of(first_spoken), Some(1));
        assert_eq!(index.line_of(index.len()), None);
        let vline = index.virtual_line_of(first_spoken).expect("vline");
        assert!(!index.virtual_lines()[vline].is_non_spoken);
        assert!(index.is_name_like(index.tokens().iter().position(|t| t == "maria").expect("maria")));
        assert!(!index.is_name_like(first_spoken));
    }

    #[test]
    fn windows_clip_at_script_start() {
        let index = sample();
        assert_eq!(index.window_ending_at(1, 5).len(), 2);
        assert_eq!(index.window_start(1, 5), 0);
        assert_eq!(index.window_ending_at(10, 3).len(), 3);
        assert_eq!(index.window_start(10, 3), 8);
    }

    #[test]
    fn empty_script_has_no_index() {
        assert!(ScriptIndex::build(&Script::from_text("\n\n  \n")).is_none());
        assert!(ScriptIndex::build(&Script::from_text("!!! ---")).is_none());
    }

    #[test]
    fn fingerprint_tracks_text() {
        let a = Script::from_text("one line here\nanother line");
        let b = Script::from_text("one line here\n\nanother line");
        let c = Script::from_text("one line here\nanother line!");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn duplicate_keys_are_counted() {
        let script = Script::from_text("say it again please now\nmiddle part is different here\nsay it again please now");
        let index = ScriptIndex::build(&script).expect("index");
        assert_eq!(index.key_frequency(0), 2);
        assert_eq!(index.key_frequency(1), 1);
        assert_eq!(index.key_frequency(2), 2);
    }
}
