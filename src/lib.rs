#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Project-wide lint exceptions:
//
// Documentation lints: internal helpers and self-describing accessors don't
// carry full docs. Public entry points still do.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Casts: word indices, pixel offsets and millisecond clocks move between
// usize, u64 and f64 constantly, always well inside f64's exact range.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: the alignment step reads best as one ordered pipeline.
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
// e.g., committed, predicted, previous
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Low-value pedantic lints that add noise:
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::return_self_not_must_use)] // Builder methods don't need must_use on every call
#![allow(clippy::len_without_is_empty)]

/// The scriptsync-core crate version (matches `Cargo.toml`).
pub const SCRIPTSYNC_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod align;
pub mod constants;
pub mod engine;
pub mod error;
pub mod index;
pub mod scroll;
pub mod text;
pub mod types;

pub use constants::*;
pub use engine::{EngineConfig, EngineSnapshot, ReadinessWait, SyncEngine, TickReport, WaitOutcome};
pub use error::{Result, SyncError};
pub use index::{Script, ScriptIndex};
pub use scroll::{BiasController, ScrollController};
pub use types::{
    Aggressiveness, AggressivenessParams, AlignmentState, BatchOutcome, BiasMode, BiasState,
    BiasTelemetry, CommitKind, DropReason, LayoutProvider, LineLayout, LineRecord, PidParams,
    RescueState, ScriptSummary, ScrollCommand, ScrollSink, Smoothness, SmoothnessParams,
    StaticLayout, TrackingState, TranscriptEvent, TuningProfile, TuningProfileBuilder,
    ViewportSnapshot, VirtualLine,
};
