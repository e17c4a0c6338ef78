//! Project model - the document that owns a task forest.

use serde::{Deserialize, Serialize};
use crate::id::ProjectId;
use crate::task::Task;
use crate::Time;

/// A project document.
///
/// The whole task forest is embedded in the document; every task mutation
/// is a read-modify-write of the entire project, guarded by `revision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (document key)
    pub id: ProjectId,

    /// Human-facing sequence id, e.g. "PRJ-0007"
    pub display_id: String,

    /// Project name
    pub name: String,

    /// Description
    pub description: String,

    /// Customer contact snapshot
    pub customer: Customer,

    /// Optional due date
    pub due_date: Option<Time>,

    /// Project status
    pub status: ProjectStatus,

    /// Ordered forest of root tasks
    pub tasks: Vec<Task>,

    /// Optimistic-concurrency counter; storage compares it at write time
    /// and bumps it on a successful save
    pub revision: u64,

    /// Creation timestamp
    pub created_at: Time,
}

/// Project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    /// No work started yet
    NotStarted,

    /// Work in progress
    Ongoing,

    /// All work delivered
    Completed,
}

/// Customer contact details, snapshotted onto the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer name
    pub name: String,

    /// Phone number
    pub phone: String,

    /// Postal address
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ProjectStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not-started\"");
        let back: ProjectStatus = serde_json::from_str("\"ongoing\"").unwrap();
        assert_eq!(back, ProjectStatus::Ongoing);
    }
}
