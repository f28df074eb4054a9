//! Inverted index from 3- and 4-grams to script positions.

use std::collections::{BTreeSet, HashMap};

use smallvec::SmallVec;

use crate::types::LineRecord;

pub const NGRAM_SIZES: [usize; 2] = [3, 4];

type Postings = SmallVec<[usize; 4]>;

/// Gram string (tokens joined by a space) to the word positions where it
/// starts. Grams never cross line boundaries.
#[derive(Debug, Clone, Default)]
pub struct NGramIndex {
    postings: HashMap<String, Postings>,
}

impl NGramIndex {
    #[must_use]
    pub fn build(tokens: &[String], lines: &[LineRecord]) -> Self {
        let mut postings: HashMap<String, Postings> = HashMap::new();
        for line in lines.iter().filter(|line| !line.is_non_spoken) {
            let words = &tokens[line.start..line.end];
            for n in NGRAM_SIZES {
                if words.len() < n {
                    continue;
                }
                for (offset, window) in words.windows(n).enumerate() {
                    postings
                        .entry(window.join(" "))
                        .or_default()
                        .push(line.start + offset);
                }
            }
        }
        Self { postings }
    }

    /// Start positions of `gram`, ascending.
    #[must_use]
    pub fn positions(&self, gram: &str) -> &[usize] {
        self.postings
            .get(gram)
            .map(SmallVec::as_slice)
            .unwrap_or_default()
    }

    /// LineRecord indices containing `gram`.
    #[must_use]
    pub fn lines_containing(&self, gram: &str, lines: &[LineRecord]) -> BTreeSet<usize> {
        self.positions(gram)
            .iter()
            .filter_map(|&pos| {
                let idx = lines.partition_point(|line| line.end <= pos);
                lines.get(idx).filter(|line| line.contains(pos)).map(|_| idx)
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Every `n`-gram of `tokens` with its offset, for `n` in [`NGRAM_SIZES`].
#[must_use]
pub fn batch_grams(tokens: &[String]) -> Vec<(usize, usize, String)> {
    let mut grams = Vec::new();
    for n in NGRAM_SIZES {
        if tokens.len() < n {
            continue;
        }
        for (offset, window) in tokens.windows(n).enumerate() {
            grams.push((offset, n, window.join(" ")));
        }
    }
    grams
}
