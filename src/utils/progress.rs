//! Download progress indicator.
//!
//! A thin wrapper over `indicatif` that renders nothing when progress output is
//! disabled (`--no-progress`, `NODEUP_NO_PROGRESS`, or stderr is not a terminal).

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;

/// Environment variable that disables every progress indicator when set.
pub const NO_PROGRESS_ENV: &str = "NODEUP_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some() || !std::io::stderr().is_terminal()
}

/// Byte-oriented progress bar for file downloads.
#[derive(Clone)]
pub struct DownloadProgress {
    inner: IndicatifBar,
}

impl DownloadProgress {
    /// Creates a bar for a transfer of `total` bytes, `position` of which are
    /// already present locally (resumed downloads).
    pub fn new(label: &str, total: Option<u64>, position: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            match total {
                Some(total) => {
                    let bar = IndicatifBar::new(total);
                    bar.set_style(download_style());
                    bar
                }
                None => {
                    let bar = IndicatifBar::new_spinner();
                    bar.set_style(spinner_style());
                    bar
                }
            }
        };
        bar.set_prefix(label.to_string());
        bar.set_position(position);
        Self { inner: bar }
    }

    /// Advance by `delta` bytes.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold.cyan} {spinner:.cyan} {bytes}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}
