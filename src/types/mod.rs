//! Public types exposed by the `scriptsync-core` crate.

pub mod layout;
pub mod script;
pub mod state;
pub mod transcript;
pub mod tuning;

pub use layout::{
    LayoutProvider, LineLayout, ScrollCommand, ScrollSink, StaticLayout, ViewportSnapshot,
};
pub use script::{LineRecord, ScriptSummary, VirtualLine};
pub use state::{
    AlignmentState, BiasMode, BiasState, BiasTelemetry, RescueState, TrackingState,
};
pub use transcript::{BatchOutcome, CommitKind, DropReason, TranscriptEvent};
pub use tuning::{
    Aggressiveness, AggressivenessParams, PidParams, Smoothness, SmoothnessParams,
    TuningProfile, TuningProfileBuilder,
};
