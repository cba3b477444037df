//! repoline - generate package repository metadata from a directory of RPMs
//!
//! Scans a repository tree, extracts per-package metadata in parallel and
//! writes the primary/filelists/other XML streams (plus optional DuckDB
//! mirrors) in one canonical order.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use repoline_core::{
    ChecksumKind, DuckdbMirror, DumpConfig, DumpProgress, MetadataCache, MetadataSnapshot,
    OrderedSink, StreamKind, XmlFileSink,
};
use repoline_rpm::RpmParser;

mod scan;

#[derive(Parser)]
#[command(name = "repoline")]
#[command(about = "Generate package repository metadata from a directory of RPMs")]
#[command(version)]
struct Cli {
    /// Repository root to scan for .rpm files
    repodir: PathBuf,

    /// Output directory (default: <repodir>/repodata)
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long, default_value_t = default_workers())]
    workers: usize,

    /// Checksum kind: md5, sha1 or sha256
    #[arg(short, long, default_value = "sha256")]
    checksum: String,

    /// Reuse metadata from the previous run for unchanged packages
    #[arg(long)]
    update: bool,

    /// With --update: trust the cache without stat'ing packages
    #[arg(long)]
    skip_stat: bool,

    /// Also write DuckDB mirrors of the three streams
    #[arg(long)]
    database: bool,

    /// Gzip-compress the XML streams
    #[arg(long)]
    gzip: bool,

    /// Changelog entries kept per package
    #[arg(long, default_value_t = 10)]
    changelog_limit: usize,

    /// Base URL consumers prepend to location hrefs
    #[arg(long)]
    location_base: Option<String>,

    /// Directory memoizing package checksums across runs
    #[arg(long)]
    checksum_cache: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress bars carry the activity on a TTY, so logging defaults to
    // quiet there; off-TTY the log IS the progress indicator.
    let progress = DumpProgress::new();
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    let quiet = cli.quiet || (progress.is_tty() && !cli.debug);
    repoline_core::init_logging(quiet, cli.debug, multi);

    let repo_root = std::fs::canonicalize(&cli.repodir)
        .with_context(|| format!("cannot open repository dir {}", cli.repodir.display()))?;
    let outdir = cli
        .outdir
        .clone()
        .unwrap_or_else(|| repo_root.join("repodata"));
    std::fs::create_dir_all(&outdir)
        .with_context(|| format!("cannot create output dir {}", outdir.display()))?;

    let checksum_kind = ChecksumKind::from_name(&cli.checksum)
        .with_context(|| format!("unknown checksum kind: {}", cli.checksum))?;

    if let Some(dir) = &cli.checksum_cache {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create checksum cache dir {}", dir.display()))?;
    }

    let tasks = scan::scan_repo(&repo_root)?;
    let total = tasks.len();
    log::info!("Found {} packages in {}", total, repo_root.display());

    let cache = if cli.update {
        match MetadataSnapshot::read_from(&outdir) {
            Ok(snapshot) => {
                if snapshot.checksum_kind != checksum_kind.name() {
                    log::warn!(
                        "previous run used {} checksums, this run uses {}; cache will not match",
                        snapshot.checksum_kind,
                        checksum_kind
                    );
                }
                let cache = MetadataCache::new(snapshot.packages, cli.skip_stat);
                log::info!("Loaded {} cached packages", cache.len());
                Some(cache)
            }
            Err(e) => {
                log::warn!("--update requested but no usable snapshot: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let mut sink = OrderedSink::new(
        Box::new(XmlFileSink::create(
            &outdir,
            StreamKind::Primary,
            total,
            cli.gzip,
        )?),
        Box::new(XmlFileSink::create(
            &outdir,
            StreamKind::Filelists,
            total,
            cli.gzip,
        )?),
        Box::new(XmlFileSink::create(
            &outdir,
            StreamKind::Other,
            total,
            cli.gzip,
        )?),
    );
    if cli.database {
        sink.attach_databases(
            Box::new(DuckdbMirror::create(&outdir, StreamKind::Primary)?),
            Box::new(DuckdbMirror::create(&outdir, StreamKind::Filelists)?),
            Box::new(DuckdbMirror::create(&outdir, StreamKind::Other)?),
        );
    }

    let config = DumpConfig {
        repo_root,
        checksum_kind,
        checksum_cache: cli.checksum_cache.clone(),
        location_base: cli.location_base.clone(),
        changelog_limit: cli.changelog_limit,
        skip_stat: cli.skip_stat,
        workers: cli.workers,
        keep_packages: true,
    };

    let pb = progress.package_bar(total as u64);
    let (stats, packages) = repoline_core::run(
        &config,
        &RpmParser,
        cache.as_ref(),
        &sink,
        tasks,
        pb.clone(),
    );
    pb.finish_and_clear();

    sink.finish().context("cannot finalize XML streams")?;

    MetadataSnapshot::new(checksum_kind.name(), packages)
        .write_to(&outdir)
        .context("cannot write metadata snapshot")?;

    print_summary(&stats, &outdir);
    Ok(())
}

fn print_summary(stats: &repoline_core::DumpStats, outdir: &std::path::Path) {
    use comfy_table::{
        modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table,
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    table.add_row(vec!["Packages", &stats.total.to_string()]);
    table.add_row(vec!["From cache", &stats.reused.to_string()]);
    table.add_row(vec!["Failed", &stats.failed.to_string()]);
    table.add_row(vec![
        "Elapsed",
        &format!("{:.1}s", stats.elapsed.as_secs_f64()),
    ]);
    table.add_row(vec!["Output", &outdir.display().to_string()]);

    eprintln!("\n{table}");
}
