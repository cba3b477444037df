//! Work items and the lock-free queue distributing them across workers

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One unit of work: a single artifact plus its globally assigned id.
///
/// Ids are dense over [0, N) and fix the emission order of all three
/// output streams.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: u64,
    /// Absolute path of the artifact.
    pub full_path: PathBuf,
    /// Basename, the key into the previous-run cache.
    pub filename: String,
    /// Directory part of `full_path`.
    pub path: PathBuf,
}

impl Task {
    /// Build a task from an absolute artifact path.
    pub fn new(id: u64, full_path: PathBuf) -> Self {
        let filename = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = full_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        Self {
            id,
            full_path,
            filename,
            path,
        }
    }
}

/// Lock-free work queue; workers atomically claim the next task.
pub struct TaskQueue {
    tasks: Vec<Task>,
    cursor: AtomicUsize,
}

impl TaskQueue {
    /// Create queue from tasks with dense ids assigned in order.
    pub fn new(tasks: Vec<Task>) -> Self {
        debug_assert!(tasks.iter().enumerate().all(|(i, t)| t.id == i as u64));
        Self {
            tasks,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next task (lock-free).
    pub fn next(&self) -> Option<&Task> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.tasks.get(i)
    }

    /// Total tasks in the queue.
    pub fn total(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(n: u64) -> Vec<Task> {
        (0..n)
            .map(|id| Task::new(id, PathBuf::from(format!("/repo/sub/pkg{id}.rpm"))))
            .collect()
    }

    #[test]
    fn task_splits_path_parts() {
        let t = Task::new(3, PathBuf::from("/repo/sub/tree-2.1.0.rpm"));
        assert_eq!(t.filename, "tree-2.1.0.rpm");
        assert_eq!(t.path, PathBuf::from("/repo/sub"));
    }

    #[test]
    fn queue_hands_out_in_order() {
        let q = TaskQueue::new(tasks(3));
        assert_eq!(q.total(), 3);
        assert_eq!(q.next().unwrap().id, 0);
        assert_eq!(q.next().unwrap().id, 1);
        assert_eq!(q.next().unwrap().id, 2);
        assert!(q.next().is_none());
    }

    #[test]
    fn empty_queue() {
        let q = TaskQueue::new(Vec::new());
        assert_eq!(q.total(), 0);
        assert!(q.next().is_none());
    }
}
