//! Viewport motion: alignment-driven corrections and the hybrid bias loop.

pub mod bias;
pub mod controller;

pub use bias::BiasController;
pub use controller::{ScrollController, target_offset};
