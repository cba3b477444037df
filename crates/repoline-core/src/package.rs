//! Package metadata entity shared by all three output streams

use serde::{Deserialize, Serialize};

/// Version comparison operator on a dependency entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepFlags {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl DepFlags {
    /// Flag string used in the primary XML (`flags="EQ"` etc.)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
        }
    }
}

/// One provides/requires/conflicts/obsoletes entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub flags: Option<DepFlags>,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
}

/// How a packaged file is listed in the filelists stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    #[default]
    File,
    Dir,
    Ghost,
}

impl FileKind {
    /// `type` attribute value, or `None` for plain files (no attribute).
    pub fn type_attr(self) -> Option<&'static str> {
        match self {
            Self::File => None,
            Self::Dir => Some("dir"),
            Self::Ghost => Some("ghost"),
        }
    }
}

/// One file carried by a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub path: String,
    pub kind: FileKind,
}

/// One changelog entry, newest first in [`Package::changelogs`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub author: String,
    pub date: i64,
    pub text: String,
}

/// Extracted metadata for one artifact.
///
/// Produced either by the artifact parser (fresh) or cloned out of a
/// previous-run cache with its location rebound. Logically immutable once
/// handed to the sink.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub arch: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    /// Content checksum of the whole package file, hex encoded. Doubles as
    /// the package id in the filelists/other streams.
    pub pkg_id: String,
    /// Textual name of the checksum kind that produced `pkg_id`.
    pub checksum_kind: String,
    pub summary: String,
    pub description: String,
    pub packager: String,
    pub url: String,
    /// mtime of the package file, seconds since epoch.
    pub time_file: i64,
    pub time_build: i64,
    pub size_package: u64,
    pub size_installed: u64,
    pub size_archive: u64,
    /// Path relative to the repository root.
    pub location_href: String,
    /// Optional absolute URL prefix for mirrored layouts.
    pub location_base: Option<String>,
    pub license: String,
    pub vendor: String,
    pub group: String,
    pub buildhost: String,
    pub sourcerpm: String,
    /// Byte range of the artifact's header section.
    pub header_start: u64,
    pub header_end: u64,
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub files: Vec<PackageFile>,
    pub changelogs: Vec<ChangelogEntry>,
}

impl Package {
    /// Overwrite the location fields. Used when a cached package is reused
    /// under a new repository layout; callers clone first, so the cache
    /// entry itself is never touched.
    pub fn rebind_location(&mut self, href: &str, base: Option<&str>) {
        self.location_href = href.to_string();
        self.location_base = base.map(str::to_string);
    }

    /// name-epoch:version-release.arch, for log lines.
    pub fn nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }
}
