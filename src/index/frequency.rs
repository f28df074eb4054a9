//! Per-line document frequency, used to rank anchor phrases by rarity.

use std::collections::{HashMap, HashSet};

use crate::types::LineRecord;

#[derive(Debug, Clone, Default)]
pub struct DocumentFrequencyMap {
    counts: HashMap<String, u32>,
    total_lines: u32,
}

impl DocumentFrequencyMap {
    #[must_use]
    pub fn build(tokens: &[String], lines: &[LineRecord]) -> Self {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut total_lines = 0;
        for line in lines.iter().filter(|line| line.token_count() > 0) {
            total_lines += 1;
            let unique: HashSet<&String> = tokens[line.start..line.end].iter().collect();
            for token in unique {
                *counts.entry(token.clone()).or_default() += 1;
            }
        }
        Self {
            counts,
            total_lines,
        }
    }

    #[must_use]
    pub fn frequency(&self, token: &str) -> u32 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Smoothed inverse document frequency; unseen tokens are the rarest.
    #[must_use]
    pub fn idf(&self, token: &str) -> f64 {
        let total = f64::from(self.total_lines);
        let df = f64::from(self.frequency(token));
        ((1.0 + total) / (1.0 + df)).ln() + 1.0
    }

    #[must_use]
    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rare_tokens_score_higher() {
        let tokens: Vec<String> = "the cat the dog the zebra"
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let lines: Vec<LineRecord> = [(0, 2), (2, 4), (4, 6)]
            .iter()
            .map(|&(start, end)| LineRecord {
                element_ref: 0,
                start,
                end,
                key: String::new(),
                is_non_spoken: false,
                is_meta: false,
                char_len: 0,
            })
            .collect();
        let df = DocumentFrequencyMap::build(&tokens, &lines);
        assert_eq!(df.total_lines(), 3);
        assert_eq!(df.frequency("the"), 3);
        assert!(df.idf("zebra") > df.idf("the"));
        assert!(df.idf("unseen") > df.idf("zebra"));
        assert!((df.idf("the") - 1.0).abs() < 1e-9);
    }
}
