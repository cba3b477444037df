//! Order-enforcing serializer for the three output streams
//!
//! Each stream has its own (mutex, condvar, counter) triple, so a fast
//! stream can run ahead of a slow one while per-stream emission order
//! stays strictly by task id. A worker holding the filelists lane never
//! blocks another worker's primary write.

use std::io;
use std::sync::{Condvar, Mutex};

use crate::db::DbSink;
use crate::package::Package;
use crate::xml::XmlTriple;
use crate::xmlfile::{ChunkSink, StreamKind};

struct LaneState {
    next_id: u64,
    sink: Box<dyn ChunkSink>,
    db: Option<Box<dyn DbSink>>,
}

struct Lane {
    kind: StreamKind,
    state: Mutex<LaneState>,
    ready: Condvar,
}

impl Lane {
    fn new(kind: StreamKind, sink: Box<dyn ChunkSink>) -> Self {
        Self {
            kind,
            state: Mutex::new(LaneState {
                next_id: 0,
                sink,
                db: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Wait for `id`'s turn, emit, advance, wake waiters. Append and
    /// mirror errors are logged; the counter advances either way so a
    /// lost record cannot wedge the ids behind it.
    fn emit(&self, id: u64, chunk: &str, pkg: &Package) {
        let mut state = self.state.lock().expect("worker thread panicked");
        while state.next_id != id {
            state = self.ready.wait(state).expect("worker thread panicked");
        }
        state.next_id += 1;

        if let Err(e) = state.sink.append_chunk(chunk) {
            log::error!(
                "cannot append {} chunk for {} ({}): {e}",
                self.kind,
                pkg.name,
                pkg.pkg_id
            );
        }
        if let Some(db) = state.db.as_mut() {
            if let Err(e) = db.add_package(pkg) {
                log::error!(
                    "cannot add record of {} ({}) to {} db: {e}",
                    pkg.name,
                    pkg.pkg_id,
                    self.kind
                );
            }
        }

        self.ready.notify_all();
    }

    /// Advance past `id` without emitting. Idempotent per id: a lane
    /// already past `id` is left alone.
    fn advance(&self, id: u64) {
        let mut state = self.state.lock().expect("worker thread panicked");
        if state.next_id > id {
            return;
        }
        while state.next_id != id {
            state = self.ready.wait(state).expect("worker thread panicked");
        }
        state.next_id += 1;
        self.ready.notify_all();
    }

    fn next_id(&self) -> u64 {
        self.state.lock().expect("worker thread panicked").next_id
    }
}

/// The three ordered output lanes, processed primary → filelists → other.
pub struct OrderedSink {
    primary: Lane,
    filelists: Lane,
    other: Lane,
}

impl OrderedSink {
    pub fn new(
        primary: Box<dyn ChunkSink>,
        filelists: Box<dyn ChunkSink>,
        other: Box<dyn ChunkSink>,
    ) -> Self {
        Self {
            primary: Lane::new(StreamKind::Primary, primary),
            filelists: Lane::new(StreamKind::Filelists, filelists),
            other: Lane::new(StreamKind::Other, other),
        }
    }

    /// Attach database mirrors. Each receives packages in its lane's order.
    pub fn attach_databases(
        &mut self,
        primary: Box<dyn DbSink>,
        filelists: Box<dyn DbSink>,
        other: Box<dyn DbSink>,
    ) {
        self.primary.state.get_mut().expect("sink not shared yet").db = Some(primary);
        self.filelists.state.get_mut().expect("sink not shared yet").db = Some(filelists);
        self.other.state.get_mut().expect("sink not shared yet").db = Some(other);
    }

    /// Blocking write: emits on all three streams in the fixed order,
    /// waiting on each lane until `id`'s turn comes up there.
    pub fn write(&self, id: u64, res: &XmlTriple, pkg: &Package) {
        self.primary.emit(id, &res.primary, pkg);
        self.filelists.emit(id, &res.filelists, pkg);
        self.other.emit(id, &res.other, pkg);
    }

    /// Failure-path advance: bump all three counters past `id` without
    /// appending anything.
    pub fn skip(&self, id: u64) {
        self.primary.advance(id);
        self.filelists.advance(id);
        self.other.advance(id);
    }

    /// Current primary counter; the reorder buffer's readiness key.
    pub fn next_id_primary(&self) -> u64 {
        self.primary.next_id()
    }

    /// Counters of all three lanes (primary, filelists, other).
    pub fn counters(&self) -> (u64, u64, u64) {
        (
            self.primary.next_id(),
            self.filelists.next_id(),
            self.other.next_id(),
        )
    }

    /// Close all stream sinks and mirrors. Mirror close failures are
    /// logged, stream close failures are returned.
    pub fn finish(self) -> io::Result<()> {
        for lane in [self.primary, self.filelists, self.other] {
            let state = lane.state.into_inner().expect("worker thread panicked");
            state.sink.finalize()?;
            if let Some(db) = state.db {
                if let Err(e) = db.finalize() {
                    log::error!("cannot close {} db: {e}", lane.kind);
                }
            }
        }
        Ok(())
    }
}
