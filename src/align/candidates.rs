//! Candidate positions for a spoken batch.

use std::collections::BTreeSet;

use crate::index::{ScriptIndex, batch_grams};

/// Sorted, deduplicated word indices aligned to the batch's last token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    pub indices: Vec<usize>,
    /// True when n-gram lookup produced the set; false for the fallback window.
    pub seeded: bool,
}

impl CandidateSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }
}

/// Candidate search bounds around the predicted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub center: usize,
    pub back: usize,
    pub ahead: usize,
}

/// Positions where the batch's last token would sit if one of its 3/4-grams
/// matched the script there.
#[must_use]
pub fn seed_from_ngrams(index: &ScriptIndex, batch: &[String]) -> BTreeSet<usize> {
    let mut seeds = BTreeSet::new();
    let last = batch.len().saturating_sub(1);
    for (offset, _, gram) in batch_grams(batch) {
        for &position in index.ngrams().positions(&gram) {
            let candidate = position + (last - offset);
            if candidate < index.len() {
                seeds.insert(candidate);
            }
        }
    }
    seeds
}

/// N-gram seeds, or every spoken word inside `window` when nothing matches.
#[must_use]
pub fn generate(index: &ScriptIndex, batch: &[String], window: SearchWindow) -> CandidateSet {
    let seeds = seed_from_ngrams(index, batch);
    if !seeds.is_empty() {
        return CandidateSet {
            indices: seeds.into_iter().collect(),
            seeded: true,
        };
    }
    if index.is_empty() {
        return CandidateSet::default();
    }
    let low = window.center.saturating_sub(window.back);
    let high = window.center.saturating_add(window.ahead).min(index.last_index());
    let indices = (low..=high)
        .filter(|&word| {
            index
                .line_record_of(word)
                .is_some_and(|line| !line.is_non_spoken)
        })
        .collect();
    CandidateSet {
        indices,
        seeded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Script;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn index(text: &str) -> ScriptIndex {
        ScriptIndex::build(&Script::from_text(text)).expect("index")
    }

    #[test]
    fn seeds_align_to_last_token() {
        let index = index("one two three four five six seven eight");
        let set = generate(
            &index,
            &toks("three four five"),
            SearchWindow { center: 0, back: 20, ahead: 200 },
        );
        assert!(set.seeded);
        assert_eq!(set.indices, vec![4]);
    }

    #[test]
    fn partial_matches_still_seed() {
        let index = index("one two three four five six seven eight");
        // Only "five six seven" matches; the batch ends on a misheard token.
        let set = generate(
            &index,
            &toks("five six seven ate"),
            SearchWindow { center: 0, back: 20, ahead: 200 },
        );
        assert!(set.seeded);
        assert_eq!(set.indices, vec![7]);
    }

    #[test]
    fn falls_back_to_window_without_grams() {
        let index = index("# Title\none two three four five six seven eight nine ten");
        let set = generate(
            &index,
            &toks("zzz yyy xxx"),
            SearchWindow { center: 4, back: 2, ahead: 3 },
        );
        assert!(!set.seeded);
        assert_eq!(set.indices, vec![2, 3, 4, 5, 6, 7]);

        // The header word at index 0 is never a fallback candidate.
        let set = generate(
            &index,
            &toks("zzz yyy xxx"),
            SearchWindow { center: 0, back: 5, ahead: 2 },
        );
        assert_eq!(set.indices, vec![1, 2]);
    }

    #[test]
    fn window_is_clipped_to_script() {
        let index = index("alpha beta gamma delta");
        let set = generate(
            &index,
            &toks("zzz yyy xxx"),
            SearchWindow { center: 3, back: 1, ahead: 500 },
        );
        assert_eq!(set.indices, vec![2, 3]);
    }
}
