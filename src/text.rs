//! Token normalization shared by script indexing and transcript handling.
//!
//! Both sides of every comparison go through [`normalize_tokens`], so the
//! rules only need to be consistent, not linguistically complete. Rules run
//! in a fixed order: NFC, apostrophe unification, lowercasing, contraction
//! expansion, number ranges and percents, small integers to words, symbol
//! stripping, whitespace collapse.

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Ordered literal rewrites applied after lowercasing.
const CONTRACTIONS: &[(&str, &str)] = &[
    (r"\bwon't\b", "will not"),
    (r"\bcan't\b", "can not"),
    (r"\bshan't\b", "shall not"),
    (r"n't\b", " not"),
    (r"\bit's\b", "it is"),
    (r"\bthat's\b", "that is"),
    (r"\blet's\b", "let us"),
    (r"'re\b", " are"),
    (r"'ll\b", " will"),
    (r"'ve\b", " have"),
    (r"'d\b", " would"),
    (r"'m\b", " am"),
    (r"(\d+(?:\.\d+)?)\s*[-\x{2013}\x{2014}]\s*(\d+(?:\.\d+)?)", "$1 to $2"),
    (r"(\d+(?:\.\d+)?)\s*%", "$1 percent"),
];

struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

fn rewrites() -> &'static [Rewrite] {
    static REWRITES: OnceCell<Vec<Rewrite>> = OnceCell::new();
    REWRITES.get_or_init(|| {
        CONTRACTIONS
            .iter()
            .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
                Ok(pattern) => Some(Rewrite {
                    pattern,
                    replacement: *replacement,
                }),
                Err(err) => {
                    tracing::error!(target: "scriptsync::text", error = %err, pattern, "normalization rule failed to compile");
                    None
                }
            })
            .collect()
    })
}

fn small_integer() -> Option<&'static Regex> {
    static SMALL_INT: OnceCell<std::result::Result<Regex, String>> = OnceCell::new();
    let regex = SMALL_INT
        .get_or_init(|| Regex::new(r"\b\d{1,2}\b").map_err(|err| err.to_string()));
    match regex {
        Ok(re) => Some(re),
        Err(msg) => {
            tracing::error!(target: "scriptsync::text", error = %msg, "small integer regex init failed");
            None
        }
    }
}

/// Spoken form of an integer in `0..=99`; larger values are returned as digits.
#[must_use]
pub fn number_words(n: u32) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            if n % 10 == 0 {
                tens.to_string()
            } else {
                format!("{tens} {}", ONES[(n % 10) as usize])
            }
        }
        _ => n.to_string(),
    }
}

/// True for digit strings and for the words [`number_words`] produces.
#[must_use]
pub fn is_numeric_token(token: &str) -> bool {
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    ONES.contains(&token) || TENS[2..].contains(&token) || token == "hundred"
}

fn unify_apostrophes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02BC}' | '\u{2032}' | '`' | '\u{00B4}' => '\'',
            other => other,
        })
        .collect()
}

fn expand(text: &str) -> String {
    let mut out = text.to_string();
    for rule in rewrites() {
        if rule.pattern.is_match(&out) {
            out = rule.pattern.replace_all(&out, rule.replacement).into_owned();
        }
    }
    if let Some(re) = small_integer() {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                caps[0]
                    .parse::<u32>()
                    .map_or_else(|_| caps[0].to_string(), number_words)
            })
            .into_owned();
    }
    out
}

fn strip_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            out.push(c);
        } else if c != '\'' {
            // Apostrophes join ("john's" -> "johns"); other symbols split.
            out.push(' ');
        }
    }
    out
}

/// Canonical lowercase word tokens for `text`.
#[must_use]
pub fn normalize_tokens(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let composed: String = text.nfc().collect();
    let lowered = unify_apostrophes(&composed).to_lowercase();
    strip_symbols(&expand(&lowered))
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalized tokens joined by single spaces.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    normalize_tokens(text).join(" ")
}

/// Normalized tokens of capitalized words that do not open a sentence.
///
/// Used by the entity bonus. Single letters and ALL-CAPS words are ignored so
/// that "I" and shouted headers do not count as names.
#[must_use]
pub fn name_like_tokens(raw: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut sentence_start = true;
    for word in raw.split_whitespace() {
        let core = word.trim_matches(|c: char| !c.is_alphanumeric());
        let mut chars = core.chars();
        let capitalized = chars.next().is_some_and(char::is_uppercase)
            && chars.clone().next().is_some()
            && chars.any(char::is_lowercase);
        if capitalized && !sentence_start {
            names.extend(normalize_tokens(core));
        }
        sentence_start = word.ends_with(['.', '!', '?', ':']);
    }
    names
}

/// Truncate `text` to at most `max` graphemes without splitting clusters.
#[must_use]
pub fn truncate_at_grapheme_boundary(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<String> {
        normalize_tokens(text)
    }

    #[test]
    fn expands_contractions_with_curly_apostrophes() {
        assert_eq!(toks("We won\u{2019}t go"), vec!["we", "will", "not", "go"]);
        assert_eq!(toks("They don't know"), vec!["they", "do", "not", "know"]);
        assert_eq!(toks("It's what we're doing"), vec!["it", "is", "what", "we", "are", "doing"]);
        assert_eq!(toks("I'm sure you'll see"), vec!["i", "am", "sure", "you", "will", "see"]);
        assert_eq!(toks("That's what I'd say"), vec!["that", "is", "what", "i", "would", "say"]);
    }

    #[test]
    fn converts_small_integers_and_keeps_large_ones() {
        assert_eq!(toks("7 dogs"), vec!["seven", "dogs"]);
        assert_eq!(toks("42"), vec!["forty", "two"]);
        assert_eq!(toks("90"), vec!["ninety"]);
        assert_eq!(toks("2024 plans"), vec!["2024", "plans"]);
    }

    #[test]
    fn speaks_ranges_and_percents() {
        assert_eq!(toks("10-20"), vec!["ten", "to", "twenty"]);
        assert_eq!(toks("up 12%"), vec!["up", "twelve", "percent"]);
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(toks("  Hello,   world!\n\t(again) "), vec!["hello", "world", "again"]);
        assert_eq!(toks("well-known"), vec!["well", "known"]);
        assert_eq!(toks("John's car"), vec!["johns", "car"]);
        assert!(toks("   ").is_empty());
        assert!(toks("!!!").is_empty());
    }

    #[test]
    fn keeps_unicode_letters() {
        assert_eq!(toks("Café Überraschung"), vec!["café", "überraschung"]);
    }

    #[test]
    fn normalization_is_idempotent_on_its_output() {
        let once = normalize_text("We can't wait, it's 5-10% off!");
        assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn numeric_token_detection() {
        assert!(is_numeric_token("2024"));
        assert!(is_numeric_token("seven"));
        assert!(is_numeric_token("forty"));
        assert!(!is_numeric_token("dog"));
        assert!(!is_numeric_token(""));
    }

    #[test]
    fn name_like_skips_sentence_starts() {
        let names = name_like_tokens("Today we met Alice. Then Bob arrived in NASA HQ.");
        assert!(names.contains("alice"));
        assert!(!names.contains("today"));
        assert!(!names.contains("then"));
        assert!(names.contains("bob"));
        assert!(!names.contains("nasa"));
    }

    #[test]
    fn truncation_respects_graphemes() {
        assert_eq!(truncate_at_grapheme_boundary("héllo", 2), "hé");
        assert_eq!(truncate_at_grapheme_boundary("hi", 5), "hi");
    }
}
