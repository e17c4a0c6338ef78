//! Enquiry intake.
//!
//! CRUD over incoming customer enquiries and the atomic
//! enquiry-to-project conversion.

#![warn(missing_docs)]

pub mod desk;

pub use desk::{BasicEnquiryDesk, EnquiryDesk, EnquiryPatch, IntakeError, NewEnquiry};
