//! Error types surfaced by the public API.
//!
//! Alignment itself never fails: weak evidence, empty candidate sets and
//! missing layout all degrade to typed outcomes. Errors are reserved for
//! configuration that cannot be applied.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid tuning profile: {field} {reason}")]
    InvalidTuning {
        field: &'static str,
        reason: String,
    },

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },

    #[error("unknown {kind} preset: {value}")]
    UnknownPreset { kind: &'static str, value: String },

    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    pub(crate) fn tuning(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidTuning {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }
}
