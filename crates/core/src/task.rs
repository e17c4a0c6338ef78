//! Task model - a node in a project's task forest.

use serde::{Deserialize, Serialize};
use crate::id::{TaskId, UserId};
use crate::time::TimeEntry;
use crate::Time;

/// A task in a project's forest.
///
/// A task owns its subtree exclusively: the forest is a tree, never a DAG.
/// Ids are unique across the whole forest of the owning project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Task name
    pub name: String,

    /// Detailed description
    pub description: String,

    /// Estimated effort in hours
    pub estimated_hours: Option<f64>,

    /// Billing rate for this task
    pub cost_per_hour: Option<f64>,

    /// Deadline
    pub deadline: Option<Time>,

    /// Whether the task is done
    pub completed: bool,

    /// Assigned users (snapshots, not live references)
    pub assignees: Vec<Assignee>,

    /// Operator-entered contribution weight (0-100), display only
    pub percentage: Option<u8>,

    /// Time logged against this task
    pub time_entries: Vec<TimeEntry>,

    /// Child tasks
    pub children: Vec<Task>,

    /// Creation timestamp
    pub created_at: Time,
}

impl Task {
    /// Ids of direct children that are not yet complete.
    ///
    /// A task may only be marked complete once this is empty.
    pub fn incomplete_children(&self) -> Vec<TaskId> {
        self.children
            .iter()
            .filter(|c| !c.completed)
            .map(|c| c.id)
            .collect()
    }

    /// Whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Snapshot of an assigned user, captured at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Auth-service id
    pub user_id: UserId,

    /// Display name at assignment time
    pub name: String,

    /// Email at assignment time
    pub email: String,
}

/// Address of a node in a task forest: ids from a root downward.
///
/// The empty path addresses the root level itself - valid as an insertion
/// target or parent, never as a node. Resolution is strict: every segment
/// must match a node id at its level, with no partial-path fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPath(Vec<TaskId>);

impl TaskPath {
    /// The empty path (root level).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from id segments.
    pub fn new(segments: Vec<TaskId>) -> Self {
        Self(segments)
    }

    /// The id segments, root first.
    pub fn segments(&self) -> &[TaskId] {
        &self.0
    }

    /// Whether this is the empty (root-level) path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Extend the path downward by one id.
    pub fn child(&self, id: TaskId) -> Self {
        let mut segments = self.0.clone();
        segments.push(id);
        Self(segments)
    }
}

impl From<Vec<TaskId>> for TaskPath {
    fn from(segments: Vec<TaskId>) -> Self {
        Self(segments)
    }
}

impl std::fmt::Display for TaskPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("/");
        write!(f, "{}", joined)
    }
}

/// Error parsing a slash-joined task path.
#[derive(Debug, thiserror::Error)]
#[error("invalid task path segment {segment:?}: {source}")]
pub struct PathParseError {
    /// The offending segment text
    pub segment: String,

    /// Underlying id decode failure
    #[source]
    pub source: ulid::DecodeError,
}

impl std::str::FromStr for TaskPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in s.split('/').filter(|p| !p.is_empty()) {
            let id = part.parse().map_err(|source| PathParseError {
                segment: part.to_owned(),
                source,
            })?;
            segments.push(id);
        }
        Ok(Self(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display_round_trips() {
        let a = TaskId::new();
        let b = TaskId::new();
        let path = TaskPath::new(vec![a, b]);
        let parsed: TaskPath = path.to_string().parse().unwrap();
        assert_eq!(parsed, path);
    }

    #[test]
    fn empty_string_parses_to_root() {
        let path: TaskPath = "".parse().unwrap();
        assert!(path.is_root());
    }

    #[test]
    fn garbage_segment_is_rejected() {
        assert!("not-an-id".parse::<TaskPath>().is_err());
    }
}
