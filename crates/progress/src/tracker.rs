//! Progress tracking service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use trellis_core::{tree, Project, ProjectId, Task, TaskId, TaskPath};
use trellis_storage::{Storage, StorageError};

use crate::effort::{self, EffortSummary};

/// Errors from progress queries.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// No project with this id
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// A path segment failed to resolve
    #[error("no task at path '{0}'")]
    PathNotFound(TaskPath),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Completion counts over a whole project.
///
/// Derived purely from `completed` flags; the operator-entered
/// `percentage` annotation on tasks is not consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProgress {
    /// Every node in the forest
    pub total_tasks: usize,

    /// Nodes with `completed` set
    pub completed_tasks: usize,

    /// completed/total as a percentage; 0 for an empty forest
    pub percentage: f32,
}

/// Completion counts over one subtree (the addressed node inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeProgress {
    /// Root of the subtree
    pub task_id: TaskId,

    /// Nodes in the subtree
    pub total_tasks: usize,

    /// Nodes with `completed` set
    pub completed_tasks: usize,

    /// completed/total as a percentage
    pub percentage: f32,
}

/// Progress reporting service.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Completion counts for the whole project.
    async fn project_progress(&self, project: ProjectId) -> Result<ProjectProgress, ProgressError>;

    /// Completion counts for the subtree addressed by `path`.
    async fn task_progress(
        &self,
        project: ProjectId,
        path: &TaskPath,
    ) -> Result<SubtreeProgress, ProgressError>;

    /// Estimated hours vs. logged time for the whole project.
    async fn effort(&self, project: ProjectId) -> Result<EffortSummary, ProgressError>;
}

/// Basic progress tracker implementation.
pub struct BasicProgressTracker<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicProgressTracker<S> {
    /// Create a tracker owning its storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Create a tracker over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    async fn load(&self, id: ProjectId) -> Result<Project, ProgressError> {
        self.storage
            .lock()
            .await
            .load_project(id)
            .await?
            .ok_or(ProgressError::ProjectNotFound(id))
    }
}

fn count(forest: &[Task]) -> (usize, usize) {
    let mut total = 0usize;
    let mut completed = 0usize;
    tree::for_each(forest, &mut |task| {
        total += 1;
        if task.completed {
            completed += 1;
        }
    });
    (total, completed)
}

fn ratio(completed: usize, total: usize) -> f32 {
    if total > 0 {
        (completed as f32 / total as f32) * 100.0
    } else {
        0.0
    }
}

#[async_trait]
impl<S: Storage + 'static> ProgressTracker for BasicProgressTracker<S> {
    async fn project_progress(&self, project: ProjectId) -> Result<ProjectProgress, ProgressError> {
        let doc = self.load(project).await?;
        let (total, completed) = count(&doc.tasks);
        Ok(ProjectProgress {
            total_tasks: total,
            completed_tasks: completed,
            percentage: ratio(completed, total),
        })
    }

    async fn task_progress(
        &self,
        project: ProjectId,
        path: &TaskPath,
    ) -> Result<SubtreeProgress, ProgressError> {
        let doc = self.load(project).await?;
        let node = tree::node_at(&doc.tasks, path)
            .ok_or_else(|| ProgressError::PathNotFound(path.clone()))?;
        let subtree = std::slice::from_ref(node);
        let (total, completed) = count(subtree);
        Ok(SubtreeProgress {
            task_id: node.id,
            total_tasks: total,
            completed_tasks: completed,
            percentage: ratio(completed, total),
        })
    }

    async fn effort(&self, project: ProjectId) -> Result<EffortSummary, ProgressError> {
        let doc = self.load(project).await?;
        Ok(effort::compute(&doc.tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trellis_core::{Customer, ProjectStatus, TimeEntry, UserContext};
    use trellis_storage::MemoryStorage;

    fn task(name: &str, completed: bool) -> Task {
        Task {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            estimated_hours: None,
            cost_per_hour: None,
            deadline: None,
            completed,
            assignees: Vec::new(),
            percentage: None,
            time_entries: Vec::new(),
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// A, B { B1 done, B2 } with estimates and logged time on B1.
    async fn seed() -> (BasicProgressTracker<MemoryStorage>, ProjectId, TaskId) {
        let ctx = UserContext::new("u-1", "Alma", "alma@example.com");
        let a = task("A", false);
        let mut b = task("B", false);
        let mut b1 = task("B1", true);
        let b2 = task("B2", false);

        b1.estimated_hours = Some(4.0);
        b1.time_entries.push(TimeEntry::closed(&ctx, Utc::now(), 90));
        // An open entry must not count toward logged time
        b1.time_entries.push(TimeEntry::open(&ctx, Utc::now()));
        b.estimated_hours = Some(2.0);
        let b_id = b.id;
        b.children.push(b1);
        b.children.push(b2);

        let project = Project {
            id: ProjectId::new(),
            display_id: "PRJ-0001".into(),
            name: "Rollout".into(),
            description: String::new(),
            customer: Customer::default(),
            due_date: None,
            status: ProjectStatus::Ongoing,
            tasks: vec![a, b],
            revision: 0,
            created_at: Utc::now(),
        };
        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();
        (BasicProgressTracker::new(storage), project.id, b_id)
    }

    #[tokio::test]
    async fn project_progress_counts_every_node() {
        let (tracker, project, _) = seed().await;
        let progress = tracker.project_progress(project).await.unwrap();
        assert_eq!(progress.total_tasks, 4);
        assert_eq!(progress.completed_tasks, 1);
        assert!((progress.percentage - 25.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn subtree_progress_is_inclusive() {
        let (tracker, project, b) = seed().await;
        let progress = tracker
            .task_progress(project, &TaskPath::new(vec![b]))
            .await
            .unwrap();
        assert_eq!(progress.task_id, b);
        assert_eq!(progress.total_tasks, 3);
        assert_eq!(progress.completed_tasks, 1);
    }

    #[tokio::test]
    async fn effort_sums_estimates_and_closed_minutes() {
        let (tracker, project, _) = seed().await;
        let effort = tracker.effort(project).await.unwrap();
        assert!((effort.estimated_hours - 6.0).abs() < f64::EPSILON);
        assert_eq!(effort.logged_minutes, 90);
        assert!((effort.logged_hours() - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_forest_reads_as_zero_percent() {
        let project = Project {
            id: ProjectId::new(),
            display_id: "PRJ-0002".into(),
            name: "Empty".into(),
            description: String::new(),
            customer: Customer::default(),
            due_date: None,
            status: ProjectStatus::NotStarted,
            tasks: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
        };
        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();
        let tracker = BasicProgressTracker::new(storage);

        let progress = tracker.project_progress(project.id).await.unwrap();
        assert_eq!(progress.total_tasks, 0);
        assert_eq!(progress.percentage, 0.0);
    }
}
