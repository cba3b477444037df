//! repoline-core - parallel repodata dump pipeline
//!
//! Distributes per-package metadata extraction across worker threads while
//! the three XML streams (primary, filelists, other) are emitted in one
//! shared canonical order, optionally mirrored into tabular databases and
//! accelerated by a previous-run metadata cache.

pub mod buffer;
pub mod cache;
pub mod checksum;
pub mod db;
pub mod error;
pub mod extract;
pub mod logging;
pub mod package;
pub mod progress;
pub mod sink;
pub mod snapshot;
pub mod task;
pub mod worker;
pub mod xml;
pub mod xmlfile;

// Re-exports for convenience
pub use buffer::{BufferedResult, ReorderBuffer, MAX_BUFFER};
pub use cache::MetadataCache;
pub use checksum::ChecksumKind;
pub use db::{DbSink, DuckdbMirror};
pub use error::{DbError, ExtractError, FormatError};
pub use extract::{FileStat, HeaderRange, LoadRequest, PackageParser};
pub use logging::init_logging;
pub use package::Package;
pub use progress::DumpProgress;
pub use sink::OrderedSink;
pub use snapshot::{MetadataSnapshot, SNAPSHOT_NAME};
pub use task::{Task, TaskQueue};
pub use worker::{run, DumpConfig, DumpStats};
pub use xml::XmlTriple;
pub use xmlfile::{ChunkSink, StreamKind, XmlFileSink};
