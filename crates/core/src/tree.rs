//! Pure algebra over a project's task forest.
//!
//! Paths are strict: every segment must match a node id at its level.
//! There is no partial-path fallback and no id search outside the
//! addressed branch.

use crate::id::TaskId;
use crate::task::{Task, TaskPath};

/// Resolve the node addressed by `path` (root-first, target inclusive).
///
/// The empty path addresses the root level, not a node, and resolves
/// to `None`.
pub fn node_at<'a>(forest: &'a [Task], path: &TaskPath) -> Option<&'a Task> {
    descend(forest, path.segments())
}

fn descend<'a>(forest: &'a [Task], segments: &[TaskId]) -> Option<&'a Task> {
    let (first, rest) = segments.split_first()?;
    let node = forest.iter().find(|t| t.id == *first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        descend(&node.children, rest)
    }
}

/// Mutable variant of [`node_at`].
pub fn node_at_mut<'a>(forest: &'a mut [Task], path: &TaskPath) -> Option<&'a mut Task> {
    descend_mut(forest, path.segments())
}

fn descend_mut<'a>(forest: &'a mut [Task], segments: &[TaskId]) -> Option<&'a mut Task> {
    let (first, rest) = segments.split_first()?;
    let node = forest.iter_mut().find(|t| t.id == *first)?;
    if rest.is_empty() {
        Some(node)
    } else {
        descend_mut(&mut node.children, rest)
    }
}

/// The child list under `parent` - the forest itself for the root path.
///
/// `None` when the parent path does not resolve.
pub fn children_at<'a>(forest: &'a [Task], parent: &TaskPath) -> Option<&'a [Task]> {
    if parent.is_root() {
        Some(forest)
    } else {
        node_at(forest, parent).map(|n| n.children.as_slice())
    }
}

/// Mutable variant of [`children_at`], suitable for insertion/removal.
pub fn children_at_mut<'a>(
    forest: &'a mut Vec<Task>,
    parent: &TaskPath,
) -> Option<&'a mut Vec<Task>> {
    if parent.is_root() {
        Some(forest)
    } else {
        node_at_mut(forest, parent).map(|n| &mut n.children)
    }
}

/// Whether any node in the forest carries `id`.
pub fn contains(forest: &[Task], id: TaskId) -> bool {
    forest
        .iter()
        .any(|t| t.id == id || contains(&t.children, id))
}

/// Depth-first visit of every node in the forest.
pub fn for_each(forest: &[Task], f: &mut impl FnMut(&Task)) {
    for task in forest {
        f(task);
        for_each(&task.children, f);
    }
}

/// Why a direct-child lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildError {
    /// The parent path did not resolve
    PathNotFound,

    /// The parent resolved, but the id lives in another branch
    Mismatch,

    /// The id exists nowhere in the forest
    Unknown,
}

/// Resolve the direct child `id` under `parent`, classifying failures:
/// an unresolvable path, a path/id mismatch (the id lives elsewhere in
/// the forest), or a wholly unknown id.
pub fn child_at_mut<'a>(
    forest: &'a mut Vec<Task>,
    parent: &TaskPath,
    id: TaskId,
) -> Result<&'a mut Task, ChildError> {
    if children_at(forest, parent).is_none() {
        return Err(ChildError::PathNotFound);
    }
    let elsewhere = contains(forest, id);
    match children_at_mut(forest, parent).and_then(|c| c.iter_mut().find(|t| t.id == id)) {
        Some(task) => Ok(task),
        None if elsewhere => Err(ChildError::Mismatch),
        None => Err(ChildError::Unknown),
    }
}

/// Remove the direct child `id` under `parent`, dropping its whole
/// subtree. Same failure classification as [`child_at_mut`].
pub fn remove_child(
    forest: &mut Vec<Task>,
    parent: &TaskPath,
    id: TaskId,
) -> Result<Task, ChildError> {
    if children_at(forest, parent).is_none() {
        return Err(ChildError::PathNotFound);
    }
    let elsewhere = contains(forest, id);
    let children = match children_at_mut(forest, parent) {
        Some(children) => children,
        None => return Err(ChildError::PathNotFound),
    };
    match children.iter().position(|t| t.id == id) {
        Some(index) => Ok(children.remove(index)),
        None if elsewhere => Err(ChildError::Mismatch),
        None => Err(ChildError::Unknown),
    }
}

/// Clamp operator-entered weights into the 0-100 range across the
/// whole forest. Run before every document save.
pub fn sanitize(forest: &mut [Task]) {
    for task in forest.iter_mut() {
        if let Some(pct) = task.percentage {
            if pct > 100 {
                task.percentage = Some(100);
            }
        }
        sanitize(&mut task.children);
    }
}
