//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// Logger routing records through a `MultiProgress` so log lines don't
/// tear active progress bars.
struct ProgressLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl log::Log for ProgressLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let line = format!("[{:<5}] {}", record.level(), record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging. TTY callers pass their `MultiProgress`; without one
/// a plain env_logger is installed.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    );

    match multi {
        Some(multi) => {
            let inner = builder.build();
            let max_level = inner.filter();
            log::set_boxed_logger(Box::new(ProgressLogger {
                inner,
                multi: multi.clone(),
            }))
            .expect("failed to init logger");
            log::set_max_level(max_level);
        }
        None => builder.init(),
    }
}
