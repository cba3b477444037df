//! Repository discovery: find artifacts and build the dense task list

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use repoline_core::Task;

/// Find every `.rpm` under `repo_root`, sorted by path so task ids (and
/// with them the emission order of all three streams) are stable across
/// runs over the same tree.
pub fn scan_repo(repo_root: &Path) -> Result<Vec<Task>> {
    let pattern = repo_root.join("**").join("*.rpm");
    let pattern_str = pattern.to_string_lossy();

    let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)
        .context("invalid glob pattern")?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(id, path)| Task::new(id as u64, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_rpms_recursively_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.rpm"), b"b").unwrap();
        std::fs::write(dir.path().join("a.rpm"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let tasks = scan_repo(dir.path()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 0);
        assert_eq!(tasks[0].filename, "a.rpm");
        assert_eq!(tasks[1].id, 1);
        assert_eq!(tasks[1].filename, "b.rpm");
    }

    #[test]
    fn empty_repo_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_repo(dir.path()).unwrap().is_empty());
    }
}
