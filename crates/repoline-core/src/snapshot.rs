//! Metadata snapshot: the previous-run cache on disk

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::package::Package;

/// File name of the snapshot inside the output directory.
pub const SNAPSHOT_NAME: &str = "metadata.json";

/// Everything a later `--update` run needs to skip unchanged packages.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Checksum kind the run used; entries are stale for other kinds.
    pub checksum_kind: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub packages: Vec<Package>,
}

impl MetadataSnapshot {
    /// Snapshot of the packages just dumped, stamped now.
    pub fn new(checksum_kind: &str, packages: Vec<Package>) -> Self {
        Self {
            checksum_kind: checksum_kind.to_string(),
            created_at: chrono::Utc::now(),
            packages,
        }
    }

    /// Write snapshot to `dir/metadata.json`.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SNAPSHOT_NAME);
        let json = serde_json::to_string(self).context("failed to serialize snapshot")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Read snapshot from `dir/metadata.json`.
    pub fn read_from(dir: &Path) -> Result<Self> {
        let path = dir.join(SNAPSHOT_NAME);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot: Self =
            serde_json::from_str(&json).with_context(|| "failed to parse metadata.json")?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = MetadataSnapshot {
            checksum_kind: "sha256".into(),
            created_at: chrono::Utc::now(),
            packages: vec![Package {
                name: "tree".into(),
                pkg_id: "deadbeef".into(),
                location_href: "tree.rpm".into(),
                ..Default::default()
            }],
        };

        snapshot.write_to(dir.path()).unwrap();
        let loaded = MetadataSnapshot::read_from(dir.path()).unwrap();
        assert_eq!(loaded.checksum_kind, "sha256");
        assert_eq!(loaded.packages.len(), 1);
        assert_eq!(loaded.packages[0].name, "tree");
    }

    #[test]
    fn read_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MetadataSnapshot::read_from(dir.path()).is_err());
    }

    #[test]
    fn read_from_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_NAME), b"not json").unwrap();
        assert!(MetadataSnapshot::read_from(dir.path()).is_err());
    }
}
