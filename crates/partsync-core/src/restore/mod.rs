//! Restore pipeline.

pub mod engine;

pub use engine::{RestoreEngine, RestoreProgress, RestoreReport};
