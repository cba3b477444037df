//! Error types for the dump pipeline

use std::io;

/// Error from extracting metadata out of an artifact on disk.
///
/// Distinguishes the failure classes the worker loop logs differently:
/// a broken package, a filesystem error, or a checksum problem.
#[derive(Debug)]
pub enum ExtractError {
    /// The artifact could not be parsed (bad magic, truncated header, ...)
    Parse(String),
    /// open/read/stat failed
    Io(io::Error),
    /// Content checksum computation failed
    Checksum(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Checksum(msg) => write!(f, "checksum: {msg}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<io::Error> for ExtractError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// XML serialization failure for a parsed package.
///
/// Non-retryable: the same input will fail the same way, so the task is
/// skipped and the failure logged at error level.
#[derive(Debug)]
pub enum FormatError {
    Xml(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(msg) => write!(f, "XML: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Failure inside a database mirror. Logged by the sink and never
/// propagated past it.
#[derive(Debug)]
pub enum DbError {
    Open(String),
    Insert(String),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(msg) => write!(f, "cannot open database: {msg}"),
            Self::Insert(msg) => write!(f, "insert failed: {msg}"),
        }
    }
}

impl std::error::Error for DbError {}
