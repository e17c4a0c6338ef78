//! Task creation specs, field patches, and direct-child resolution.

use serde::{Deserialize, Serialize};
use trellis_core::{tree, Assignee, Task, TaskId, TaskPath, Time};

use crate::manager::ProjectError;

/// Specification for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Task name
    pub name: String,

    /// Description
    pub description: String,

    /// Estimated effort in hours
    pub estimated_hours: Option<f64>,

    /// Billing rate
    pub cost_per_hour: Option<f64>,

    /// Deadline
    pub deadline: Option<Time>,

    /// Assigned users
    pub assignees: Vec<Assignee>,

    /// Contribution weight (0-100)
    pub percentage: Option<u8>,
}

impl NewTask {
    /// Materialize the spec into a fresh node: new id, not completed,
    /// no children, no time entries.
    pub(crate) fn into_task(self, now: Time) -> Task {
        Task {
            id: TaskId::new(),
            name: self.name,
            description: self.description,
            estimated_hours: self.estimated_hours,
            cost_per_hour: self.cost_per_hour,
            deadline: self.deadline,
            completed: false,
            assignees: self.assignees,
            percentage: self.percentage,
            time_entries: Vec::new(),
            children: Vec::new(),
            created_at: now,
        }
    }
}

/// Fields to merge into an existing task.
///
/// Absent fields are left untouched. `children` and `time_entries` are
/// not reachable through a patch, and `completed` only changes through
/// the gated completion operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New name
    pub name: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New estimate
    pub estimated_hours: Option<f64>,

    /// New billing rate
    pub cost_per_hour: Option<f64>,

    /// New deadline
    pub deadline: Option<Time>,

    /// Replacement assignee list
    pub assignees: Option<Vec<Assignee>>,

    /// New contribution weight (0-100)
    pub percentage: Option<u8>,
}

impl TaskPatch {
    pub(crate) fn apply(self, task: &mut Task) -> Result<(), ProjectError> {
        if let Some(pct) = self.percentage {
            if pct > 100 {
                return Err(ProjectError::InvalidPercentage(pct));
            }
            task.percentage = Some(pct);
        }
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = Some(hours);
        }
        if let Some(rate) = self.cost_per_hour {
            task.cost_per_hour = Some(rate);
        }
        if let Some(deadline) = self.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(assignees) = self.assignees {
            task.assignees = assignees;
        }
        Ok(())
    }
}

fn classify(err: tree::ChildError, parent: &TaskPath, task_id: TaskId) -> ProjectError {
    match err {
        tree::ChildError::PathNotFound => ProjectError::PathNotFound(parent.clone()),
        tree::ChildError::Mismatch => ProjectError::PathMismatch {
            path: parent.clone(),
            task_id,
        },
        tree::ChildError::Unknown => ProjectError::TaskNotFound(task_id),
    }
}

/// Resolve the direct child `task_id` under `parent`.
pub(crate) fn child_mut<'a>(
    forest: &'a mut Vec<Task>,
    parent: &TaskPath,
    task_id: TaskId,
) -> Result<&'a mut Task, ProjectError> {
    tree::child_at_mut(forest, parent, task_id).map_err(|e| classify(e, parent, task_id))
}

/// Remove the direct child `task_id` under `parent`, dropping its whole
/// subtree.
pub(crate) fn remove_child(
    forest: &mut Vec<Task>,
    parent: &TaskPath,
    task_id: TaskId,
) -> Result<Task, ProjectError> {
    tree::remove_child(forest, parent, task_id).map_err(|e| classify(e, parent, task_id))
}
