//! Content checksums for package files, with an optional on-disk cache

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

/// Checksum algorithms understood by the repodata format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumKind {
    /// Canonical name as it appears in XML `type` attributes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Parse a CLI/config string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const READ_BUF: usize = 64 * 1024;

/// Hex checksum of a whole file.
pub fn checksum_file(path: &Path, kind: ChecksumKind) -> io::Result<String> {
    let mut file = File::open(path)?;
    match kind {
        ChecksumKind::Md5 => digest_stream::<Md5>(&mut file),
        ChecksumKind::Sha1 => digest_stream::<Sha1>(&mut file),
        ChecksumKind::Sha256 => digest_stream::<Sha256>(&mut file),
    }
}

fn digest_stream<D: Digest>(file: &mut File) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_BUF];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checksum with memoization in `cache_dir`.
///
/// The cache key encodes filename, mtime and size, so a stale entry for a
/// rebuilt package can never be returned. Failing to persist a fresh result
/// is harmless and only logged at debug.
pub fn cached_checksum_file(
    path: &Path,
    kind: ChecksumKind,
    cache_dir: &Path,
    mtime: i64,
    size: u64,
) -> io::Result<String> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cache_path = cache_dir.join(format!("{filename}-{mtime}-{size}.{kind}"));

    if let Ok(cached) = std::fs::read_to_string(&cache_path) {
        let cached = cached.trim();
        if !cached.is_empty() {
            log::debug!("checksum cache hit {}", cache_path.display());
            return Ok(cached.to_string());
        }
    }

    let sum = checksum_file(path, kind)?;
    if let Err(e) = std::fs::write(&cache_path, &sum) {
        log::debug!("cannot store checksum in {}: {e}", cache_path.display());
    }
    Ok(sum)
}
