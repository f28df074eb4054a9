//! Batch rejection before any alignment work.

use crate::constants::{MAX_FILLER_RATIO, MAX_OOV_RATIO};
use crate::index::ScriptIndex;
use crate::types::DropReason;

/// Hesitations and operator commands that are not script speech.
const FILLER_TOKENS: &[&str] = &[
    "ok", "okay", "scroll", "scrolling", "testing", "test", "um", "uh", "umm", "uhh", "er",
    "erm", "hmm", "mm", "ah", "yeah", "pause",
];

#[must_use]
pub fn is_filler(token: &str) -> bool {
    FILLER_TOKENS.contains(&token)
}

/// Fraction of `batch` tokens absent from the script vocabulary.
#[must_use]
pub fn oov_ratio(batch: &[String], index: &ScriptIndex) -> f64 {
    if batch.is_empty() {
        return 0.0;
    }
    let missing = batch.iter().filter(|t| !index.in_vocabulary(t)).count();
    missing as f64 / batch.len() as f64
}

#[must_use]
pub fn filler_ratio(batch: &[String]) -> f64 {
    if batch.is_empty() {
        return 0.0;
    }
    let filler = batch.iter().filter(|t| is_filler(t)).count();
    filler as f64 / batch.len() as f64
}

/// Reason to drop `batch`, if any.
#[must_use]
pub fn reject(batch: &[String], index: &ScriptIndex) -> Option<DropReason> {
    if oov_ratio(batch, index) > MAX_OOV_RATIO {
        return Some(DropReason::OutOfVocabulary);
    }
    if filler_ratio(batch) > MAX_FILLER_RATIO {
        return Some(DropReason::FillerSpeech);
    }
    None
}
