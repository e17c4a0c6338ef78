//! Progress reporting.
//!
//! Completion roll-ups over a project's task forest and effort
//! (estimate vs. logged time) summaries. All figures are recomputed
//! from the document on every call, never incrementally maintained.

#![warn(missing_docs)]

pub mod tracker;
pub mod effort;

pub use tracker::{
    BasicProgressTracker, ProgressError, ProgressTracker, ProjectProgress, SubtreeProgress,
};
pub use effort::EffortSummary;
