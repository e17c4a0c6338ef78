//! Timer and manual time-logging service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use trellis_core::{
    tree, EntryId, Project, ProjectId, Task, TaskId, TaskPath, TimeEntry, UserContext, UserId,
};
use trellis_storage::{Storage, StorageError};

/// Errors from timer and time-entry operations.
#[derive(Debug, thiserror::Error)]
pub enum TimeError {
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

    /// The user already has an open entry on this task
    #[error("a timer is already running on task {task_id} for user {user_id}")]
    AlreadyRunning {
        /// The task being timed
        task_id: TaskId,
        /// The user with the open entry
        user_id: UserId,
    },

    /// Nothing to stop
    #[error("no open entry on task {task_id} for user {user_id}")]
    NoOpenEntry {
        /// The task addressed
        task_id: TaskId,
        /// The user without an open entry
        user_id: UserId,
    },

    /// Manual logs must carry at least one minute
    #[error("logged duration must be at least one minute")]
    InvalidDuration,

    /// No entry with this id on the task
    #[error("time entry {0} not found")]
    EntryNotFound(EntryId),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-user time total on one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTotal {
    /// Auth-service id
    pub user_id: UserId,

    /// Display name snapshot from the summed entries
    pub user_name: String,

    /// Summed closed minutes; open entries contribute 0
    pub minutes: u32,
}

/// Timer service.
///
/// State machine per (task, user): `idle -> running -> idle`, with
/// manual logging as an independent transition that never passes
/// through `running`. Stop closes *that user's* open entry, located
/// explicitly - never "the last entry in the list".
#[async_trait]
pub trait TimeTracker: Send + Sync {
    /// Start the clock for `ctx` on the direct child `task` of `parent`.
    async fn start(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
    ) -> Result<TimeEntry, TimeError>;

    /// Stop the clock for `ctx`, fixing the entry's duration.
    async fn stop(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
    ) -> Result<TimeEntry, TimeError>;

    /// Log `minutes` retroactively: merged into the user's most recent
    /// closed entry on the task, or a new closed entry stamped now.
    async fn log(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
        minutes: u32,
    ) -> Result<TimeEntry, TimeError>;

    /// All entries on the task, oldest first.
    async fn entries(
        &self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Vec<TimeEntry>, TimeError>;

    /// Entries grouped by user with summed minutes.
    async fn summary(
        &self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Vec<UserTotal>, TimeError>;

    /// Remove a mislogged entry.
    async fn discard(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        entry: EntryId,
    ) -> Result<(), TimeError>;
}

/// Basic time tracker implementation.
pub struct BasicTimeTracker<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicTimeTracker<S> {
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

    async fn load(&self, id: ProjectId) -> Result<Project, TimeError> {
        self.storage
            .lock()
            .await
            .load_project(id)
            .await?
            .ok_or(TimeError::ProjectNotFound(id))
    }

    async fn save(&self, mut project: Project) -> Result<(), TimeError> {
        tree::sanitize(&mut project.tasks);
        self.storage.lock().await.save_project(&project).await?;
        Ok(())
    }
}

fn resolve<'a>(
    forest: &'a mut Vec<Task>,
    parent: &TaskPath,
    task_id: TaskId,
) -> Result<&'a mut Task, TimeError> {
    tree::child_at_mut(forest, parent, task_id).map_err(|e| match e {
        tree::ChildError::PathNotFound => TimeError::PathNotFound(parent.clone()),
        tree::ChildError::Mismatch => TimeError::PathMismatch {
            path: parent.clone(),
            task_id,
        },
        tree::ChildError::Unknown => TimeError::TaskNotFound(task_id),
    })
}

/// The user's open entry on a task, if any. At most one exists because
/// `start` refuses to stack a second.
fn open_entry_mut<'a>(task: &'a mut Task, user: &UserId) -> Option<&'a mut TimeEntry> {
    task.time_entries
        .iter_mut()
        .find(|e| e.is_open() && &e.user_id == user)
}

#[async_trait]
impl<S: Storage + 'static> TimeTracker for BasicTimeTracker<S> {
    async fn start(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
    ) -> Result<TimeEntry, TimeError> {
        let mut doc = self.load(project).await?;
        let node = resolve(&mut doc.tasks, parent, task)?;
        if open_entry_mut(node, &ctx.user_id).is_some() {
            return Err(TimeError::AlreadyRunning {
                task_id: task,
                user_id: ctx.user_id.clone(),
            });
        }
        let entry = TimeEntry::open(ctx, Utc::now());
        node.time_entries.push(entry.clone());
        self.save(doc).await?;
        debug!("started timer on task {} for {}", task, ctx.user_id);
        Ok(entry)
    }

    async fn stop(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
    ) -> Result<TimeEntry, TimeError> {
        let mut doc = self.load(project).await?;
        let node = resolve(&mut doc.tasks, parent, task)?;
        let entry = match open_entry_mut(node, &ctx.user_id) {
            Some(entry) => {
                entry.close(Utc::now());
                entry.clone()
            }
            None => {
                return Err(TimeError::NoOpenEntry {
                    task_id: task,
                    user_id: ctx.user_id.clone(),
                })
            }
        };
        self.save(doc).await?;
        debug!(
            "stopped timer on task {} for {} after {} minute(s)",
            task, ctx.user_id, entry.minutes
        );
        Ok(entry)
    }

    async fn log(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        ctx: &UserContext,
        minutes: u32,
    ) -> Result<TimeEntry, TimeError> {
        if minutes == 0 {
            return Err(TimeError::InvalidDuration);
        }
        let mut doc = self.load(project).await?;
        let node = resolve(&mut doc.tasks, parent, task)?;
        let entry = match node
            .time_entries
            .iter_mut()
            .rev()
            .find(|e| !e.is_open() && e.user_id == ctx.user_id)
        {
            Some(existing) => {
                existing.minutes += minutes;
                existing.clone()
            }
            None => {
                let fresh = TimeEntry::closed(ctx, Utc::now(), minutes);
                node.time_entries.push(fresh.clone());
                fresh
            }
        };
        self.save(doc).await?;
        Ok(entry)
    }

    async fn entries(
        &self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Vec<TimeEntry>, TimeError> {
        let mut doc = self.load(project).await?;
        let node = resolve(&mut doc.tasks, parent, task)?;
        Ok(node.time_entries.clone())
    }

    async fn summary(
        &self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
    ) -> Result<Vec<UserTotal>, TimeError> {
        let entries = self.entries(project, parent, task).await?;
        let mut totals: Vec<UserTotal> = Vec::new();
        for entry in &entries {
            match totals.iter_mut().find(|t| t.user_id == entry.user_id) {
                Some(total) => total.minutes += entry.minutes,
                None => totals.push(UserTotal {
                    user_id: entry.user_id.clone(),
                    user_name: entry.user_name.clone(),
                    minutes: entry.minutes,
                }),
            }
        }
        Ok(totals)
    }

    async fn discard(
        &mut self,
        project: ProjectId,
        parent: &TaskPath,
        task: TaskId,
        entry: EntryId,
    ) -> Result<(), TimeError> {
        let mut doc = self.load(project).await?;
        let node = resolve(&mut doc.tasks, parent, task)?;
        match node.time_entries.iter().position(|e| e.id == entry) {
            Some(index) => {
                node.time_entries.remove(index);
            }
            None => return Err(TimeError::EntryNotFound(entry)),
        }
        self.save(doc).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Customer, ProjectStatus};
    use trellis_storage::MemoryStorage;

    fn user(n: u32) -> UserContext {
        UserContext::new(
            format!("u-{}", n),
            format!("User {}", n),
            format!("user{}@example.com", n),
        )
    }

    async fn seed() -> (BasicTimeTracker<MemoryStorage>, ProjectId, TaskId) {
        let task = Task {
            id: TaskId::new(),
            name: "Design".into(),
            description: String::new(),
            estimated_hours: None,
            cost_per_hour: None,
            deadline: None,
            completed: false,
            assignees: Vec::new(),
            percentage: None,
            time_entries: Vec::new(),
            children: Vec::new(),
            created_at: Utc::now(),
        };
        let task_id = task.id;
        let project = Project {
            id: ProjectId::new(),
            display_id: "PRJ-0001".into(),
            name: "Rollout".into(),
            description: String::new(),
            customer: Customer::default(),
            due_date: None,
            status: ProjectStatus::Ongoing,
            tasks: vec![task],
            revision: 0,
            created_at: Utc::now(),
        };
        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();
        (BasicTimeTracker::new(storage), project.id, task_id)
    }

    #[tokio::test]
    async fn start_stop_round_trip_leaves_one_closed_entry() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let ctx = user(1);

        tracker.start(project, &root, task, &ctx).await.unwrap();
        let closed = tracker.stop(project, &root, task, &ctx).await.unwrap();
        assert!(!closed.is_open());

        let entries = tracker.entries(project, &root, task).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ended_at.is_some());
        // Closed immediately: rounds down to zero minutes
        assert_eq!(entries[0].minutes, 0);
    }

    #[tokio::test]
    async fn a_second_start_is_rejected() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let ctx = user(1);

        tracker.start(project, &root, task, &ctx).await.unwrap();
        let err = tracker.start(project, &root, task, &ctx).await.unwrap_err();
        assert!(matches!(err, TimeError::AlreadyRunning { .. }));
    }

    #[tokio::test]
    async fn stop_without_a_running_timer_fails() {
        let (mut tracker, project, task) = seed().await;
        let err = tracker
            .stop(project, &TaskPath::root(), task, &user(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TimeError::NoOpenEntry { .. }));
    }

    #[tokio::test]
    async fn stop_closes_the_callers_entry_not_the_last_one() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let (alma, ben) = (user(1), user(2));

        tracker.start(project, &root, task, &alma).await.unwrap();
        tracker.start(project, &root, task, &ben).await.unwrap();

        // Ben's entry is last in the list; Alma still stops her own
        let closed = tracker.stop(project, &root, task, &alma).await.unwrap();
        assert_eq!(closed.user_id, alma.user_id);

        let entries = tracker.entries(project, &root, task).await.unwrap();
        let bens: Vec<_> = entries
            .iter()
            .filter(|e| e.user_id == ben.user_id)
            .collect();
        assert_eq!(bens.len(), 1);
        assert!(bens[0].is_open());
    }

    #[tokio::test]
    async fn manual_logs_merge_into_one_entry() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let ctx = user(1);

        tracker.log(project, &root, task, &ctx, 30).await.unwrap();
        let merged = tracker.log(project, &root, task, &ctx, 30).await.unwrap();
        assert_eq!(merged.minutes, 60);

        let entries = tracker.entries(project, &root, task).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].minutes, 60);
    }

    #[tokio::test]
    async fn manual_log_never_touches_an_open_entry() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let ctx = user(1);

        tracker.start(project, &root, task, &ctx).await.unwrap();
        tracker.log(project, &root, task, &ctx, 30).await.unwrap();

        let entries = tracker.entries(project, &root, task).await.unwrap();
        assert_eq!(entries.len(), 2);
        let open: Vec<_> = entries.iter().filter(|e| e.is_open()).collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].minutes, 0);
    }

    #[tokio::test]
    async fn zero_minutes_cannot_be_logged() {
        let (mut tracker, project, task) = seed().await;
        let err = tracker
            .log(project, &TaskPath::root(), task, &user(1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TimeError::InvalidDuration));
    }

    #[tokio::test]
    async fn summary_groups_by_user() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let (alma, ben) = (user(1), user(2));

        tracker.log(project, &root, task, &alma, 30).await.unwrap();
        tracker.log(project, &root, task, &ben, 45).await.unwrap();
        // An open timer contributes nothing until closed
        tracker.start(project, &root, task, &ben).await.unwrap();

        let totals = tracker.summary(project, &root, task).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].user_id, alma.user_id);
        assert_eq!(totals[0].minutes, 30);
        assert_eq!(totals[1].user_id, ben.user_id);
        assert_eq!(totals[1].minutes, 45);
    }

    #[tokio::test]
    async fn discard_removes_a_mislogged_entry() {
        let (mut tracker, project, task) = seed().await;
        let root = TaskPath::root();
        let ctx = user(1);

        let entry = tracker.log(project, &root, task, &ctx, 30).await.unwrap();
        tracker
            .discard(project, &root, task, entry.id)
            .await
            .unwrap();
        assert!(tracker.entries(project, &root, task).await.unwrap().is_empty());

        let err = tracker
            .discard(project, &root, task, EntryId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TimeError::EntryNotFound(_)));
    }
}
