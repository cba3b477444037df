//! Bounded reorder buffer for completed-but-not-yet-writable results

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::package::Package;
use crate::xml::XmlTriple;

/// Capacity bound. Small enough to cap memory under slow sinks, large
/// enough to absorb tail skew between workers.
pub const MAX_BUFFER: usize = 20;

/// A finished task parked until its id comes up on the primary lane.
#[derive(Debug)]
pub struct BufferedResult {
    pub id: u64,
    pub xml: XmlTriple,
    pub pkg: Package,
    /// Package was reused from the previous-run cache.
    pub from_cache: bool,
}

impl PartialEq for BufferedResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BufferedResult {}

impl PartialOrd for BufferedResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BufferedResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

/// Min-heap of results ordered by id, bounded by [`MAX_BUFFER`].
pub struct ReorderBuffer {
    heap: Mutex<BinaryHeap<Reverse<BufferedResult>>>,
    total: u64,
}

impl ReorderBuffer {
    /// `total` is the run's task count N; the last task (id N-1) is never
    /// admitted so the tail of the id space always makes progress.
    pub fn new(total: u64) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("worker thread panicked").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Park a result. Refused (handed back) when the id is already
    /// writable, this is the last task, or the buffer is full.
    ///
    /// The primary counter is sampled while the buffer lock is held: every
    /// counter advance is followed by a drain that also takes this lock, so
    /// either the drain sees our parked result, or we see the advanced
    /// counter and refuse to park. A result can never be stranded between
    /// the two.
    pub fn try_defer(
        &self,
        res: BufferedResult,
        next_id_primary: impl FnOnce() -> u64,
    ) -> Result<(), BufferedResult> {
        if res.id + 1 >= self.total {
            return Err(res);
        }
        let mut heap = self.heap.lock().expect("worker thread panicked");
        if heap.len() >= MAX_BUFFER || res.id == next_id_primary() {
            return Err(res);
        }
        heap.push(Reverse(res));
        Ok(())
    }

    /// Pop the head iff its id equals `next_id_primary`.
    pub fn pop_if_ready(&self, next_id_primary: u64) -> Option<BufferedResult> {
        let mut heap = self.heap.lock().expect("worker thread panicked");
        if heap
            .peek()
            .is_some_and(|Reverse(res)| res.id == next_id_primary)
        {
            heap.pop().map(|Reverse(res)| res)
        } else {
            None
        }
    }
}
