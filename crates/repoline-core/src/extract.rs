//! Artifact extraction: parser seam, stat info, checksum and header range

use std::fs;
use std::io;
use std::path::Path;

use crate::checksum::{self, ChecksumKind};
use crate::error::ExtractError;
use crate::package::Package;

/// File identity consulted by cache freshness checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    /// mtime, seconds since epoch.
    pub mtime: i64,
    pub size: u64,
}

impl FileStat {
    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::from_metadata(&fs::metadata(path)?))
    }

    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            mtime,
            size: meta.len(),
        }
    }
}

/// Byte range occupied by an artifact's header section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// Format-specific artifact reader.
///
/// The pipeline itself is format-agnostic; the RPM implementation lives in
/// its own crate, and tests substitute stub parsers.
pub trait PackageParser: Sync {
    /// Parse descriptive metadata, keeping at most `changelog_limit`
    /// changelog entries.
    fn parse(&self, path: &Path, changelog_limit: usize) -> Result<Package, ExtractError>;

    /// Byte offsets of the artifact's header section.
    fn header_range(&self, path: &Path) -> Result<HeaderRange, ExtractError>;
}

/// Inputs for [`load_package`], bundled so the worker loop stays readable.
pub struct LoadRequest<'a> {
    pub path: &'a Path,
    pub checksum_kind: ChecksumKind,
    pub checksum_cache: Option<&'a Path>,
    pub location_href: &'a str,
    pub location_base: Option<&'a str>,
    pub changelog_limit: usize,
    /// Stat info obtained by the caller; `None` means stat here.
    pub stat: Option<FileStat>,
}

/// Load one package from disk: parse, bind locations, stat, checksum,
/// header range. Any failure aborts the whole load.
pub fn load_package(
    parser: &dyn PackageParser,
    req: &LoadRequest<'_>,
) -> Result<Package, ExtractError> {
    let mut pkg = parser.parse(req.path, req.changelog_limit)?;

    pkg.location_href = req.location_href.to_string();
    pkg.location_base = req.location_base.map(str::to_string);
    pkg.checksum_kind = req.checksum_kind.name().to_string();

    let stat = match req.stat {
        Some(stat) => stat,
        None => FileStat::read(req.path)?,
    };
    pkg.time_file = stat.mtime;
    pkg.size_package = stat.size;

    pkg.pkg_id = match req.checksum_cache {
        Some(dir) => {
            checksum::cached_checksum_file(req.path, req.checksum_kind, dir, stat.mtime, stat.size)
        }
        None => checksum::checksum_file(req.path, req.checksum_kind),
    }
    .map_err(|e| ExtractError::Checksum(format!("{}: {e}", req.path.display())))?;

    let range = parser.header_range(req.path)?;
    pkg.header_start = range.start;
    pkg.header_end = range.end;

    Ok(pkg)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubParser;

    impl PackageParser for StubParser {
        fn parse(&self, path: &Path, _changelog_limit: usize) -> Result<Package, ExtractError> {
            Ok(Package {
                name: path
                    .file_stem()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned(),
                ..Default::default()
            })
        }

        fn header_range(&self, _path: &Path) -> Result<HeaderRange, ExtractError> {
            Ok(HeaderRange { start: 96, end: 1024 })
        }
    }

    #[test]
    fn load_package_fills_ambient_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.rpm");
        std::fs::write(&path, b"package bytes").unwrap();

        let req = LoadRequest {
            path: &path,
            checksum_kind: ChecksumKind::Sha256,
            checksum_cache: None,
            location_href: "sub/tree.rpm",
            location_base: Some("http://mirror.example"),
            changelog_limit: 10,
            stat: None,
        };
        let pkg = load_package(&StubParser, &req).unwrap();

        assert_eq!(pkg.name, "tree");
        assert_eq!(pkg.location_href, "sub/tree.rpm");
        assert_eq!(pkg.location_base.as_deref(), Some("http://mirror.example"));
        assert_eq!(pkg.checksum_kind, "sha256");
        assert_eq!(pkg.size_package, 13);
        assert_eq!(pkg.header_start, 96);
        assert_eq!(pkg.header_end, 1024);
        assert_eq!(pkg.pkg_id.len(), 64);
    }

    #[test]
    fn load_package_uses_caller_stat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.rpm");
        std::fs::write(&path, b"package bytes").unwrap();

        let req = LoadRequest {
            path: &path,
            checksum_kind: ChecksumKind::Sha1,
            checksum_cache: None,
            location_href: "tree.rpm",
            location_base: None,
            changelog_limit: 10,
            stat: Some(FileStat {
                mtime: 4242,
                size: 13,
            }),
        };
        let pkg = load_package(&StubParser, &req).unwrap();
        assert_eq!(pkg.time_file, 4242);
        assert_eq!(pkg.checksum_kind, "sha1");
    }

    #[test]
    fn load_package_missing_file_is_io_error() {
        let req = LoadRequest {
            path: Path::new("/nonexistent/pkg.rpm"),
            checksum_kind: ChecksumKind::Sha256,
            checksum_cache: None,
            location_href: "pkg.rpm",
            location_base: None,
            changelog_limit: 0,
            stat: None,
        };
        // StubParser ignores the path, so the failure comes from stat.
        let err = load_package(&StubParser, &req).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
