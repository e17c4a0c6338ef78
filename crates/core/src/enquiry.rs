//! Enquiry model - an incoming customer request, pre-project.

use serde::{Deserialize, Serialize};
use crate::id::EnquiryId;
use crate::project::Customer;
use crate::Time;

/// A customer enquiry. Converting one produces a project and removes
/// the enquiry in a single storage operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enquiry {
    /// Unique identifier
    pub id: EnquiryId,

    /// Human-facing sequence id, e.g. "ENQ-0003"
    pub display_id: String,

    /// What the customer is asking for
    pub subject: String,

    /// Details
    pub description: String,

    /// Customer contact snapshot
    pub customer: Customer,

    /// Enquiry status
    pub status: EnquiryStatus,

    /// Creation timestamp
    pub created_at: Time,
}

/// Enquiry status.
///
/// There is no `Converted` state: conversion removes the enquiry and
/// creates the project in one storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnquiryStatus {
    /// Awaiting triage
    Open,

    /// Customer has been contacted
    Contacted,
}
