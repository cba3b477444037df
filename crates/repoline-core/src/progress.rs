//! Overall progress reporting for a dump run

use std::io::IsTerminal;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<10.cyan} {bar:30.green/dim} {pos:>6}/{len:6} {per_sec:>12} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Progress context for a run: one packages bar, TTY auto-detect.
pub struct DumpProgress {
    multi: MultiProgress,
    is_tty: bool,
}

impl DumpProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Bar counting packages dumped out of the run total. Hidden off-TTY;
    /// logging is the progress indicator there.
    pub fn package_bar(&self, total: u64) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(bar_style());
        pb.set_prefix("packages");
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// `MultiProgress` handle for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for DumpProgress {
    fn default() -> Self {
        Self::new()
    }
}
