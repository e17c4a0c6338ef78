//! Time tracking against tasks.
//!
//! Per-(task, user) timers with an explicit open-entry lookup, plus
//! manual logging that never passes through the running state.

#![warn(missing_docs)]

pub mod tracker;

pub use tracker::{BasicTimeTracker, TimeError, TimeTracker, UserTotal};
