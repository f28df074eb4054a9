//! One-shot "ready or timed out" latch, resolved by the watchdog tick.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

/// Resolves once, when a predicate first holds or when the deadline passes.
/// Later polls return nothing and never re-evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessWait {
    started_ms: u64,
    timeout_ms: u64,
    outcome: Option<WaitOutcome>,
}

impl ReadinessWait {
    #[must_use]
    pub fn new(started_ms: u64, timeout_ms: u64) -> Self {
        Self {
            started_ms,
            timeout_ms,
            outcome: None,
        }
    }

    /// Returns the outcome only on the poll that resolves the wait.
    pub fn poll(&mut self, now_ms: u64, ready: impl FnOnce() -> bool) -> Option<WaitOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        let outcome = if ready() {
            WaitOutcome::Ready
        } else if now_ms.saturating_sub(self.started_ms) >= self.timeout_ms {
            WaitOutcome::TimedOut
        } else {
            return None;
        };
        self.outcome = Some(outcome);
        Some(outcome)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<WaitOutcome> {
        self.outcome
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }
}
