//! Customer-facing financials.
//!
//! A settlement aggregates payments against a billable total computed
//! from the project's task forest. Totals and statuses are recomputed,
//! never incrementally maintained.

#![warn(missing_docs)]

pub mod manager;

pub use manager::{billable_total, BasicSettlementManager, BillingError, SettlementManager};
