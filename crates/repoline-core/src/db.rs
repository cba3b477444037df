//! Tabular database mirrors of the XML streams (DuckDB)

use std::path::Path;

use duckdb::{params, Connection};

use crate::error::DbError;
use crate::package::Package;
use crate::xmlfile::StreamKind;

/// Mirror sink receiving packages in the same order as its XML stream.
pub trait DbSink: Send {
    fn add_package(&mut self, pkg: &Package) -> Result<(), DbError>;

    /// Flush and close the database.
    fn finalize(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

fn open_err(e: impl std::fmt::Display) -> DbError {
    DbError::Open(e.to_string())
}

fn insert_err(e: impl std::fmt::Display) -> DbError {
    DbError::Insert(e.to_string())
}

const PRIMARY_SCHEMA: &str = "CREATE TABLE packages (
    pkgid TEXT, name TEXT, arch TEXT,
    epoch TEXT, version TEXT, release TEXT,
    summary TEXT, description TEXT, url TEXT,
    time_file BIGINT, time_build BIGINT,
    size_package BIGINT, size_installed BIGINT,
    location_href TEXT, location_base TEXT,
    license TEXT, vendor TEXT, rpm_group TEXT,
    buildhost TEXT, sourcerpm TEXT,
    header_start BIGINT, header_end BIGINT
)";

const FILELISTS_SCHEMA: &str = "CREATE TABLE filelist (
    pkgid TEXT, name TEXT, path TEXT, type TEXT
)";

const OTHER_SCHEMA: &str = "CREATE TABLE changelog (
    pkgid TEXT, name TEXT, author TEXT, date BIGINT, text TEXT
)";

/// DuckDB-backed mirror; the schema depends on which stream it shadows.
///
/// A fresh database replaces any file left over from an earlier run.
pub struct DuckdbMirror {
    conn: Connection,
    kind: StreamKind,
}

impl DuckdbMirror {
    pub fn create(dir: &Path, kind: StreamKind) -> Result<Self, DbError> {
        let path = dir.join(kind.db_file_name());
        if path.exists() {
            std::fs::remove_file(&path).map_err(open_err)?;
        }
        let conn = Connection::open(&path).map_err(open_err)?;
        let schema = match kind {
            StreamKind::Primary => PRIMARY_SCHEMA,
            StreamKind::Filelists => FILELISTS_SCHEMA,
            StreamKind::Other => OTHER_SCHEMA,
        };
        conn.execute_batch(schema).map_err(open_err)?;
        Ok(Self { conn, kind })
    }
}

impl DbSink for DuckdbMirror {
    fn add_package(&mut self, pkg: &Package) -> Result<(), DbError> {
        match self.kind {
            StreamKind::Primary => {
                let mut stmt = self
                    .conn
                    .prepare_cached(
                        "INSERT INTO packages VALUES \
                         (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    )
                    .map_err(insert_err)?;
                stmt.execute(params![
                    pkg.pkg_id,
                    pkg.name,
                    pkg.arch,
                    pkg.epoch,
                    pkg.version,
                    pkg.release,
                    pkg.summary,
                    pkg.description,
                    pkg.url,
                    pkg.time_file,
                    pkg.time_build,
                    pkg.size_package as i64,
                    pkg.size_installed as i64,
                    pkg.location_href,
                    pkg.location_base,
                    pkg.license,
                    pkg.vendor,
                    pkg.group,
                    pkg.buildhost,
                    pkg.sourcerpm,
                    pkg.header_start as i64,
                    pkg.header_end as i64,
                ])
                .map_err(insert_err)?;
            }
            StreamKind::Filelists => {
                let mut stmt = self
                    .conn
                    .prepare_cached("INSERT INTO filelist VALUES (?, ?, ?, ?)")
                    .map_err(insert_err)?;
                for file in &pkg.files {
                    stmt.execute(params![
                        pkg.pkg_id,
                        pkg.name,
                        file.path,
                        file.kind.type_attr().unwrap_or("file"),
                    ])
                    .map_err(insert_err)?;
                }
            }
            StreamKind::Other => {
                let mut stmt = self
                    .conn
                    .prepare_cached("INSERT INTO changelog VALUES (?, ?, ?, ?, ?)")
                    .map_err(insert_err)?;
                for entry in &pkg.changelogs {
                    stmt.execute(params![
                        pkg.pkg_id,
                        pkg.name,
                        entry.author,
                        entry.date,
                        entry.text,
                    ])
                    .map_err(insert_err)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ChangelogEntry, FileKind, PackageFile};

    fn sample() -> Package {
        Package {
            name: "tree".into(),
            arch: "x86_64".into(),
            pkg_id: "abc123".into(),
            files: vec![
                PackageFile {
                    path: "/usr/bin/tree".into(),
                    kind: FileKind::File,
                },
                PackageFile {
                    path: "/usr/share/doc/tree".into(),
                    kind: FileKind::Dir,
                },
            ],
            changelogs: vec![ChangelogEntry {
                author: "Jane".into(),
                date: 1700000000,
                text: "- update".into(),
            }],
            ..Default::default()
        }
    }

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn primary_mirror_one_row_per_package() {
        let dir = tempfile::tempdir().unwrap();
        let mut mirror = DuckdbMirror::create(dir.path(), StreamKind::Primary).unwrap();
        mirror.add_package(&sample()).unwrap();
        assert_eq!(count(&mirror.conn, "SELECT count(*) FROM packages"), 1);
    }

    #[test]
    fn filelists_mirror_one_row_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mirror = DuckdbMirror::create(dir.path(), StreamKind::Filelists).unwrap();
        mirror.add_package(&sample()).unwrap();
        assert_eq!(count(&mirror.conn, "SELECT count(*) FROM filelist"), 2);
        let kind: String = mirror
            .conn
            .query_row(
                "SELECT type FROM filelist WHERE path = '/usr/share/doc/tree'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(kind, "dir");
    }

    #[test]
    fn other_mirror_one_row_per_changelog() {
        let dir = tempfile::tempdir().unwrap();
        let mut mirror = DuckdbMirror::create(dir.path(), StreamKind::Other).unwrap();
        mirror.add_package(&sample()).unwrap();
        assert_eq!(count(&mirror.conn, "SELECT count(*) FROM changelog"), 1);
    }

    #[test]
    fn create_replaces_stale_db() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("primary.db"), b"stale").unwrap();
        let mirror = DuckdbMirror::create(dir.path(), StreamKind::Primary);
        assert!(mirror.is_ok());
    }
}
