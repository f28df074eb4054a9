//! Multi-factor similarity between a spoken batch and a script window.
//!
//! The components are intentionally simple: cosine over raw 2/3-gram counts,
//! F1 over character sets, and Jaccard over suffix-stripped tokens. The
//! acceptance thresholds elsewhere are calibrated against exactly this mix.

use std::collections::{HashMap, HashSet};

use unicode_segmentation::UnicodeSegmentation;

use crate::constants::{
    CHAR_F1_WEIGHT, COSINE_WEIGHT, HEADER_PRIOR, JACCARD_WEIGHT, META_LINE_FACTOR,
    META_LINE_PENALTY, NAME_ENTITY_BONUS, NUMERIC_ENTITY_BONUS, SHORT_LINE_PENALTY,
    SHORT_LINE_TOKENS,
};
use crate::index::ScriptIndex;
use crate::text::is_numeric_token;

const STEM_SUFFIXES: [&str; 6] = ["ing", "est", "ed", "er", "ly", "s"];

/// Strip one common English suffix, keeping at least three characters.
#[must_use]
pub fn stem(token: &str) -> &str {
    for suffix in STEM_SUFFIXES {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.chars().count() >= 3 {
                return stripped;
            }
        }
    }
    token
}

fn gram_counts(tokens: &[String]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for n in [2, 3] {
        for window in tokens.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

/// Cosine of the raw 2- and 3-gram count vectors.
#[must_use]
pub fn ngram_cosine(a: &[String], b: &[String]) -> f64 {
    let left = gram_counts(a);
    let right = gram_counts(b);
    if left.is_empty() || right.is_empty() {
        // Single tokens have no grams; fall back to equality.
        return if !a.is_empty() && a == b { 1.0 } else { 0.0 };
    }
    let dot: f64 = left
        .iter()
        .filter_map(|(gram, &count)| right.get(gram).map(|&other| f64::from(count * other)))
        .sum();
    let norm = |counts: &HashMap<String, u32>| {
        counts
            .values()
            .map(|&c| f64::from(c * c))
            .sum::<f64>()
            .sqrt()
    };
    dot / (norm(&left) * norm(&right))
}

fn char_set(tokens: &[String]) -> HashSet<&str> {
    tokens
        .iter()
        .flat_map(|token| token.graphemes(true))
        .collect()
}

/// F1 of the grapheme sets of both joined strings.
#[must_use]
pub fn char_set_f1(spoken: &[String], line: &[String]) -> f64 {
    let spoken_chars = char_set(spoken);
    let line_chars = char_set(line);
    if spoken_chars.is_empty() || line_chars.is_empty() {
        return 0.0;
    }
    let shared = spoken_chars.intersection(&line_chars).count() as f64;
    if shared == 0.0 {
        return 0.0;
    }
    let precision = shared / spoken_chars.len() as f64;
    let recall = shared / line_chars.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Jaccard of the stemmed token sets.
#[must_use]
pub fn stemmed_jaccard(a: &[String], b: &[String]) -> f64 {
    let left: HashSet<&str> = a.iter().map(|t| stem(t)).collect();
    let right: HashSet<&str> = b.iter().map(|t| stem(t)).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// The three weighted components, before bonuses and penalties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityParts {
    pub cosine: f64,
    pub char_f1: f64,
    pub jaccard: f64,
}

impl SimilarityParts {
    #[must_use]
    pub fn compute(spoken: &[String], line: &[String]) -> Self {
        Self {
            cosine: ngram_cosine(spoken, line),
            char_f1: char_set_f1(spoken, line),
            jaccard: stemmed_jaccard(spoken, line),
        }
    }

    #[must_use]
    pub fn weighted(&self) -> f64 {
        COSINE_WEIGHT * self.cosine + CHAR_F1_WEIGHT * self.char_f1 + JACCARD_WEIGHT * self.jaccard
    }
}

/// Scores candidates against one script index.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    index: &'a ScriptIndex,
}

impl<'a> Scorer<'a> {
    #[must_use]
    pub fn new(index: &'a ScriptIndex) -> Self {
        Self { index }
    }

    /// Combined score of `batch` against the window ending at `candidate`.
    #[must_use]
    pub fn score(&self, batch: &[String], candidate: usize) -> f64 {
        let window = self.index.window_ending_at(candidate, batch.len());
        let window_start = self.index.window_start(candidate, batch.len());
        let mut score = SimilarityParts::compute(batch, window).weighted();

        let spoken: HashSet<&str> = batch.iter().map(String::as_str).collect();
        let shares_number = window
            .iter()
            .any(|t| is_numeric_token(t) && spoken.contains(t.as_str()));
        if shares_number {
            score += NUMERIC_ENTITY_BONUS;
        }
        let shares_name = window
            .iter()
            .enumerate()
            .any(|(i, t)| self.index.is_name_like(window_start + i) && spoken.contains(t.as_str()));
        if shares_name {
            score += NAME_ENTITY_BONUS;
        }

        if let Some(line) = self.index.line_record_of(candidate) {
            if line.token_count() < SHORT_LINE_TOKENS {
                score -= SHORT_LINE_PENALTY;
            }
            if line.is_meta {
                score = score * META_LINE_FACTOR - META_LINE_PENALTY;
            }
        }
        if self.touches_non_spoken(window_start, candidate) {
            score -= HEADER_PRIOR;
        }
        score
    }

    /// True when any line under `start..=end` is a header or direction.
    fn touches_non_spoken(&self, start: usize, end: usize) -> bool {
        let (Some(first), Some(last)) = (self.index.line_of(start), self.index.line_of(end)) else {
            return false;
        };
        self.index.lines()[first..=last]
            .iter()
            .any(|line| line.is_non_spoken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Script;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn identical_sequences_max_every_component() {
        let a = toks("the quick brown fox jumps over the lazy dog");
        let parts = SimilarityParts::compute(&a, &a);
        assert!((parts.cosine - 1.0).abs() < 1e-9);
        assert!((parts.char_f1 - 1.0).abs() < 1e-9);
        assert!((parts.jaccard - 1.0).abs() < 1e-9);
        assert!((parts.weighted() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_sequences_score_low() {
        let parts = SimilarityParts::compute(&toks("alpha beta gamma"), &toks("xyz xyz xyz"));
        assert_eq!(parts.cosine, 0.0);
        assert_eq!(parts.jaccard, 0.0);
        assert!(parts.weighted() < 0.2);
    }

    #[test]
    fn stemming_merges_inflections() {
        assert_eq!(stem("walking"), "walk");
        assert_eq!(stem("walked"), "walk");
        assert_eq!(stem("quickly"), "quick");
        assert_eq!(stem("dogs"), "dog");
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("bring"), "bring");
        let j = stemmed_jaccard(&toks("dogs walking"), &toks("dog walked"));
        assert!((j - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_counts_repeats() {
        let c = ngram_cosine(&toks("a b a b"), &toks("a b c d"));
        assert!(c > 0.0 && c < 1.0);
    }

    #[test]
    fn scorer_applies_line_penalties() {
        let script = Script::from_text(
            "We walked along the river until the sun went down over the hills.\n\
             Thanks so much.\n\
             [MUSIC SWELLS AND FADES AWAY SLOWLY NOW]",
        );
        let index = ScriptIndex::build(&script).expect("index");
        let scorer = Scorer::new(&index);

        let spoken = toks("the sun went down over the hills");
        let end = index.lines()[0].end - 1;
        let full = scorer.score(&spoken, end);
        assert!(full > 0.95, "expected near-max similarity, got {full}");

        let short_end = index.lines()[1].end - 1;
        let short = scorer.score(&toks("thanks so much"), short_end);
        // Short and meta: (1.0 - 0.12) * 0.5 - 0.2
        assert!((short - 0.24).abs() < 1e-9, "got {short}");

        let header_end = index.lines()[2].end - 1;
        let header = scorer.score(&toks("and fades away slowly now"), header_end);
        assert!(header < 0.5, "got {header}");
    }

    #[test]
    fn windows_reaching_into_directions_are_penalized() {
        let script = Script::from_text(
            "[WIND HOWLS ACROSS THE EMPTY PLAIN]\n\
             Nobody expected the storm to arrive so early that year.",
        );
        let index = ScriptIndex::build(&script).expect("index");
        let scorer = Scorer::new(&index);
        let spoken_start = index.lines()[1].start;
        // Reading the direction aloud matches a window ending on the first spoken word.
        let spoken = toks("wind howls across the empty plain nobody");
        let score = scorer.score(&spoken, spoken_start);
        assert!(score < 0.5, "got {score}");
    }

    #[test]
    fn entity_bonuses_apply() {
        let script = Script::from_text(
            "Yesterday we met with Alice near the harbour for 7 hours.",
        );
        let index = ScriptIndex::build(&script).expect("index");
        let scorer = Scorer::new(&index);
        let spoken = toks("with alice near the harbour for seven hours");
        let score = scorer.score(&spoken, index.last_index());
        let base = SimilarityParts::compute(&spoken, index.window_ending_at(index.last_index(), spoken.len()))
            .weighted();
        assert!((score - (base + NUMERIC_ENTITY_BONUS + NAME_ENTITY_BONUS)).abs() < 1e-9);
    }
}
