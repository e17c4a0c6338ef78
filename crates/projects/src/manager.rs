//! Project management service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use trellis_core::{
    next_display_id, tree, Customer, Project, ProjectId, ProjectStatus, Task, TaskId, TaskPath,
    Time,
};
use trellis_storage::{Storage, StorageError};

use crate::tasks::{child_mut, remove_child, NewTask, TaskPatch};

/// Errors from project and task-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// No project with this id
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// A path segment failed to resolve
    #[error("no task at path '{0}'")]
    PathNotFound(TaskPath),

    /// The path resolved, but the id lives in a different branch
    #[error("path '{path}' does not lead to task {task_id}")]
    PathMismatch {
        /// The parent path that was given
        path: TaskPath,
        /// The id that is not among its direct children
        task_id: TaskId,
    },

    /// The id exists nowhere in the forest
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// Completion blocked by unfinished direct children
    #[error("cannot complete task {task_id}: {} direct children incomplete", .incomplete.len())]
    ChildrenIncomplete {
        /// The task that was to be completed
        task_id: TaskId,
        /// Its unfinished direct children
        incomplete: Vec<TaskId>,
    },

    /// Weight outside 0-100
    #[error("invalid weight {0}: must be 0-100")]
    InvalidPercentage(u8),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Specification for creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    /// Project name
    pub name: String,

    /// Description
    pub description: String,

    /// Customer contact snapshot
    pub customer: Customer,

    /// Optional due date
    pub due_date: Option<Time>,
}

/// Top-level project fields to merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    /// New name
    pub name: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New customer snapshot
    pub customer: Option<Customer>,

    /// New due date
    pub due_date: Option<Time>,

    /// New status
    pub status: Option<ProjectStatus>,
}

/// Project management service.
///
/// Every task mutation is a whole-document read-modify-write; a losing
/// concurrent writer surfaces [`StorageError::RevisionConflict`] through
/// [`ProjectError::Storage`] and must re-read.
#[async_trait]
pub trait ProjectManager: Send + Sync {
    /// Create an empty project with the next `PRJ-` display id.
    async fn create_project(&mut self, spec: NewProject) -> Result<Project, ProjectError>;

    /// Load a project by id.
    async fn get_project(&self, id: ProjectId) -> Result<Project, ProjectError>;

    /// List all projects, oldest first.
    async fn list_projects(&self) -> Result<Vec<Project>, ProjectError>;

    /// Merge top-level fields into a project.
    async fn update_project(
        &mut self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, ProjectError>;

    /// Delete a project. Settlements keyed by it are left orphaned.
    async fn delete_project(&mut self, id: ProjectId) -> Result<(), ProjectError>;

    /// Resolve the task addressed by `path` (root-first, target inclusive).
    async fn task_at(&self, project: ProjectId, path: &TaskPath) -> Result<Task, ProjectError>;

    /// Append a new task under `parent` (root level for the empty path).
    async fn add_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        spec: NewTask,
    ) -> Result<Task, ProjectError>;

    /// Merge fields into the direct child `task` of `parent`.
    async fn update_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        patch: TaskPatch,
    ) -> Result<Task, ProjectError>;

    /// Remove the direct child `task` of `parent` and its whole subtree.
    async fn delete_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<(), ProjectError>;

    /// Set the completion flag on the direct child `task` of `parent`.
    ///
    /// Completing is gated: every direct child of the task must already
    /// be complete. Un-completing is always allowed.
    async fn set_completed(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        completed: bool,
    ) -> Result<Task, ProjectError>;

    /// Flip the completion flag, with the same gate as [`Self::set_completed`].
    async fn toggle_completed(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Task, ProjectError>;

    /// Bulk-rewrite contribution weights of direct children of `parent`.
    async fn set_percentages(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        weights: &[(TaskId, u8)],
    ) -> Result<(), ProjectError>;
}

/// Basic project manager implementation.
pub struct BasicProjectManager<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicProjectManager<S> {
    /// Create a manager owning its storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Create a manager over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    async fn load(&self, id: ProjectId) -> Result<Project, ProjectError> {
        self.storage
            .lock()
            .await
            .load_project(id)
            .await?
            .ok_or(ProjectError::ProjectNotFound(id))
    }

    /// Sanitize and persist a mutated document.
    async fn save(&self, mut project: Project) -> Result<(), ProjectError> {
        tree::sanitize(&mut project.tasks);
        self.storage.lock().await.save_project(&project).await?;
        debug!("saved project {}", project.id);
        Ok(())
    }
}

#[async_trait]
impl<S: Storage + 'static> ProjectManager for BasicProjectManager<S> {
    async fn create_project(&mut self, spec: NewProject) -> Result<Project, ProjectError> {
        let mut storage = self.storage.lock().await;
        let existing = storage.list_projects().await?;
        let display_id =
            next_display_id("PRJ", existing.iter().map(|p| p.display_id.as_str()));

        let project = Project {
            id: ProjectId::new(),
            display_id,
            name: spec.name,
            description: spec.description,
            customer: spec.customer,
            due_date: spec.due_date,
            status: ProjectStatus::NotStarted,
            tasks: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
        };
        storage.save_project(&project).await?;
        info!("created project {} ({})", project.display_id, project.id);
        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, ProjectError> {
        self.load(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, ProjectError> {
        Ok(self.storage.lock().await.list_projects().await?)
    }

    async fn update_project(
        &mut self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, ProjectError> {
        let mut project = self.load(id).await?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if let Some(customer) = patch.customer {
            project.customer = customer;
        }
        if let Some(due_date) = patch.due_date {
            project.due_date = Some(due_date);
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        let updated = project.clone();
        self.save(project).await?;
        Ok(updated)
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<(), ProjectError> {
        // Surface a missing project instead of silently succeeding
        self.load(id).await?;
        self.storage.lock().await.delete_project(id).await?;
        info!("deleted project {}", id);
        Ok(())
    }

    async fn task_at(&self, project: ProjectId, path: &TaskPath) -> Result<Task, ProjectError> {
        let project = self.load(project).await?;
        tree::node_at(&project.tasks, path)
            .cloned()
            .ok_or_else(|| ProjectError::PathNotFound(path.clone()))
    }

    async fn add_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        spec: NewTask,
    ) -> Result<Task, ProjectError> {
        if let Some(pct) = spec.percentage {
            if pct > 100 {
                return Err(ProjectError::InvalidPercentage(pct));
            }
        }
        let mut doc = self.load(project).await?;
        let task = spec.into_task(Utc::now());
        let children = tree::children_at_mut(&mut doc.tasks, parent)
            .ok_or_else(|| ProjectError::PathNotFound(parent.clone()))?;
        children.push(task.clone());
        self.save(doc).await?;
        debug!("added task {} under '{}'", task.id, parent);
        Ok(task)
    }

    async fn update_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        patch: TaskPatch,
    ) -> Result<Task, ProjectError> {
        let mut doc = self.load(project).await?;
        let node = child_mut(&mut doc.tasks, parent, task)?;
        patch.apply(node)?;
        let updated = node.clone();
        self.save(doc).await?;
        Ok(updated)
    }

    async fn delete_task(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<(), ProjectError> {
        let mut doc = self.load(project).await?;
        let removed = remove_child(&mut doc.tasks, parent, task)?;
        self.save(doc).await?;
        debug!(
            "deleted task {} and {} descendant(s)",
            removed.id,
            subtree_size(&removed) - 1
        );
        Ok(())
    }

    async fn set_completed(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        completed: bool,
    ) -> Result<Task, ProjectError> {
        let mut doc = self.load(project).await?;
        let node = child_mut(&mut doc.tasks, parent, task)?;
        if completed {
            let incomplete = node.incomplete_children();
            if !incomplete.is_empty() {
                return Err(ProjectError::ChildrenIncomplete {
                    task_id: task,
                    incomplete,
                });
            }
        }
        node.completed = completed;
        let updated = node.clone();
        self.save(doc).await?;
        Ok(updated)
    }

    async fn toggle_completed(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Task, ProjectError> {
        let current = self.task_at(project, &parent.child(task)).await?;
        self.set_completed(project, parent, task, !current.completed)
            .await
    }

    async fn set_percentages(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        weights: &[(TaskId, u8)],
    ) -> Result<(), ProjectError> {
        for &(_, weight) in weights {
            if weight > 100 {
                return Err(ProjectError::InvalidPercentage(weight));
            }
        }
        let mut doc = self.load(project).await?;
        for &(task_id, weight) in weights {
            let node = child_mut(&mut doc.tasks, parent, task_id)?;
            node.percentage = Some(weight);
        }
        self.save(doc).await?;
        Ok(())
    }
}

fn subtree_size(task: &Task) -> usize {
    1 + task.children.iter().map(subtree_size).sum::<usize>()
}
