//! Byte-count progress reporting for file transfers.
//!
//! The transfer component only sees the [`ProgressReporter`] /
//! [`ProgressObserver`] traits; the binary plugs in terminal bars and tests
//! plug in silent or recording reporters.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives byte counts for one in-flight transfer.
pub trait ProgressObserver: Send + Sync {
    /// Records `bytes` more bytes written.
    fn inc(&self, bytes: u64);
    /// Marks the transfer as complete.
    fn finish(&self);
    /// Marks the transfer as failed.
    fn abandon(&self, message: &str);
}

/// Creates one observer per transfer.
pub trait ProgressReporter: Send + Sync {
    /// Starts tracking a transfer of `total_bytes` bytes for `name`.
    fn start(&self, name: &str, total_bytes: u64) -> Box<dyn ProgressObserver>;
}

/// Reporter that discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

struct SilentObserver;

impl ProgressObserver for SilentObserver {
    fn inc(&self, _bytes: u64) {}
    fn finish(&self) {}
    fn abandon(&self, _message: &str) {}
}

impl ProgressReporter for SilentReporter {
    fn start(&self, _name: &str, _total_bytes: u64) -> Box<dyn ProgressObserver> {
        Box::new(SilentObserver)
    }
}

/// Terminal reporter drawing one indicatif bar per in-flight transfer.
#[derive(Clone)]
pub struct BarReporter {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    /// Creates a reporter drawing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Creates a reporter that tracks progress without drawing anything.
    #[must_use]
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

        Self {
            multi: MultiProgress::with_draw_target(target),
            style,
        }
    }
}

struct BarObserver {
    bar: ProgressBar,
}

impl ProgressObserver for BarObserver {
    fn inc(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ProgressReporter for BarReporter {
    fn start(&self, name: &str, total_bytes: u64) -> Box<dyn ProgressObserver> {
        let bar = self.multi.add(ProgressBar::new(total_bytes));
        bar.set_style(self.style.clone());
        bar.set_message(format!("Downloading {name}"));
        Box::new(BarObserver { bar })
    }
}
