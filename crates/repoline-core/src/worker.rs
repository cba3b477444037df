//! Per-task worker loop and the parallel dump driver

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::buffer::{BufferedResult, ReorderBuffer};
use crate::cache::MetadataCache;
use crate::checksum::ChecksumKind;
use crate::extract::{self, FileStat, LoadRequest, PackageParser};
use crate::package::Package;
use crate::sink::OrderedSink;
use crate::task::{Task, TaskQueue};
use crate::xml;

/// Shared configuration for one dump run.
pub struct DumpConfig {
    /// Repository root; `location_href` is each artifact path relative to it.
    pub repo_root: PathBuf,
    pub checksum_kind: ChecksumKind,
    pub checksum_cache: Option<PathBuf>,
    pub location_base: Option<String>,
    /// Changelog entries kept per package, newest first.
    pub changelog_limit: usize,
    /// Trust the cache without stat'ing artifacts.
    pub skip_stat: bool,
    pub workers: usize,
    /// Collect dumped packages for the next-run snapshot.
    pub keep_packages: bool,
}

/// Run summary, logged and returned to the caller.
#[derive(Debug)]
pub struct DumpStats {
    pub total: usize,
    pub reused: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Everything a worker touches, shared across the pool.
struct DumpContext<'a> {
    config: &'a DumpConfig,
    parser: &'a dyn PackageParser,
    cache: Option<&'a MetadataCache>,
    sink: &'a OrderedSink,
    buffer: ReorderBuffer,
    reused: AtomicUsize,
    failed: AtomicUsize,
    collected: Mutex<Vec<Package>>,
    pb: ProgressBar,
}

impl DumpContext<'_> {
    fn keep(&self, pkg: Package) {
        if self.config.keep_packages {
            self.collected
                .lock()
                .expect("worker thread panicked")
                .push(pkg);
        }
    }
}

enum DumpOutcome {
    Written,
    Deferred,
    Failed,
}

/// Drive the whole run: a fixed pool of workers draining the task queue.
/// Returns the stats and, when `keep_packages` is set, every successfully
/// dumped package (in completion order, not id order).
pub fn run(
    config: &DumpConfig,
    parser: &dyn PackageParser,
    cache: Option<&MetadataCache>,
    sink: &OrderedSink,
    tasks: Vec<Task>,
    pb: ProgressBar,
) -> (DumpStats, Vec<Package>) {
    let start = Instant::now();
    let total = tasks.len();
    let queue = TaskQueue::new(tasks);

    let ctx = DumpContext {
        config,
        parser,
        cache,
        sink,
        buffer: ReorderBuffer::new(total as u64),
        reused: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
        collected: Mutex::new(Vec::new()),
        pb,
    };

    let workers = config.workers.max(1);
    log::info!("Dumping {total} packages with {workers} workers");

    let dump = || {
        rayon::scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| {
                    while let Some(task) = queue.next() {
                        process_task(&ctx, task);
                    }
                });
            }
        })
    };
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(dump),
        Err(e) => {
            log::warn!("cannot build worker pool: {e}; falling back to the global pool");
            dump()
        }
    }

    let stats = DumpStats {
        total,
        reused: ctx.reused.load(Ordering::Relaxed),
        failed: ctx.failed.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    };

    log::info!(
        "Dumped {}/{} packages ({} from cache, {} failed) in {:.1}s",
        stats.total - stats.failed,
        stats.total,
        stats.reused,
        stats.failed,
        stats.elapsed.as_secs_f64()
    );

    let collected = ctx
        .collected
        .into_inner()
        .expect("worker thread panicked");
    (stats, collected)
}

/// One task end-to-end, then a drain pass for anything our counter
/// advance unblocked.
fn process_task(ctx: &DumpContext<'_>, task: &Task) {
    match dump_one(ctx, task) {
        // Deferred results are finished by whichever worker drains them.
        DumpOutcome::Deferred => return,
        DumpOutcome::Written => ctx.pb.inc(1),
        DumpOutcome::Failed => {
            ctx.failed.fetch_add(1, Ordering::Relaxed);
            ctx.sink.skip(task.id);
            ctx.pb.inc(1);
        }
    }
    drain_buffer(ctx);
}

fn dump_one(ctx: &DumpContext<'_>, task: &Task) -> DumpOutcome {
    let location_href = match task.full_path.strip_prefix(&ctx.config.repo_root) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => task.filename.clone(),
    };
    let location_base = ctx.config.location_base.as_deref();

    // Stat up front only when cache freshness will need it.
    let mut stat = None;
    if ctx.cache.is_some() && !ctx.config.skip_stat {
        match FileStat::read(&task.full_path) {
            Ok(s) => stat = Some(s),
            Err(e) => {
                log::error!("stat() on {}: {e}", task.full_path.display());
                return DumpOutcome::Failed;
            }
        }
    }

    let mut from_cache = false;
    let mut pkg: Option<Package> = None;

    if let Some(cache) = ctx.cache {
        if let Some(entry) = cache.lookup(&task.filename) {
            log::debug!("cache hit {}", task.filename);
            if cache.is_fresh(entry, stat.as_ref(), ctx.config.checksum_kind) {
                log::debug!("reusing cached metadata for {}", entry.nevra());
                pkg = Some(cache.reuse(entry, &location_href, location_base));
                from_cache = true;
            } else {
                log::debug!("{}: cached metadata are obsolete, re-reading", task.filename);
            }
        }
    }

    let pkg = match pkg {
        Some(pkg) => pkg,
        None => {
            let req = LoadRequest {
                path: &task.full_path,
                checksum_kind: ctx.config.checksum_kind,
                checksum_cache: ctx.config.checksum_cache.as_deref(),
                location_href: &location_href,
                location_base,
                changelog_limit: ctx.config.changelog_limit,
                stat,
            };
            match extract::load_package(ctx.parser, &req) {
                Ok(pkg) => pkg,
                Err(e) => {
                    log::warn!("cannot read package {}: {e}", task.full_path.display());
                    return DumpOutcome::Failed;
                }
            }
        }
    };

    if from_cache {
        ctx.reused.fetch_add(1, Ordering::Relaxed);
    }

    let res = match xml::dump(&pkg) {
        Ok(res) => res,
        Err(e) => {
            log::error!("cannot dump XML for {} ({}): {e}", pkg.name, pkg.pkg_id);
            return DumpOutcome::Failed;
        }
    };

    // Park the result if its turn has not come yet; otherwise write in
    // place.
    let parked = BufferedResult {
        id: task.id,
        xml: res,
        pkg,
        from_cache,
    };
    match ctx.buffer.try_defer(parked, || ctx.sink.next_id_primary()) {
        Ok(()) => DumpOutcome::Deferred,
        Err(res) => {
            ctx.sink.write(res.id, &res.xml, &res.pkg);
            ctx.keep(res.pkg);
            DumpOutcome::Written
        }
    }
}

/// Write any parked results whose turn has come. Runs after every counter
/// advance so a parked head never waits on its own (departed) worker.
fn drain_buffer(ctx: &DumpContext<'_>) {
    while let Some(res) = ctx.buffer.pop_if_ready(ctx.sink.next_id_primary()) {
        ctx.sink.write(res.id, &res.xml, &res.pkg);
        ctx.keep(res.pkg);
        ctx.pb.inc(1);
    }
}
