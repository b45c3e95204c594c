//! Progress bar and logging utilities.
//!
//! Provides helpers for creating progress bars and spinners, with support
//! for log-only mode where progress bars are hidden for tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Console reporter for one run. Carries the log-only switch instead of a
/// process-wide flag so tests and library callers can run quietly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    log_only: bool,
}

impl Reporter {
    pub fn new(log_only: bool) -> Self {
        Self { log_only }
    }

    pub fn is_log_only(&self) -> bool {
        self.log_only
    }

    /// Create a progress bar with consistent styling.
    /// In log-only mode, the progress bar is hidden.
    pub fn progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner for indeterminate progress.
    /// In log-only mode, the spinner is hidden.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg} {spinner} [{elapsed_precise}]")
                    .unwrap(),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Log progress for tail-friendly output.
    /// Only logs when in log-only mode and at specified intervals.
    pub fn log_progress(&self, phase: &str, current: u64, total: u64, interval: u64) {
        if self.log_only && total > 0 && (current % interval.max(1) == 0 || current == total) {
            let pct = 100.0 * current as f64 / total as f64;
            eprintln!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
        }
    }

    /// Per-file warning. Printed above an active bar when one is passed.
    pub fn warn(&self, pb: Option<&ProgressBar>, msg: &str) {
        match pb {
            Some(pb) if !self.log_only => pb.println(format!("[!] {}", msg)),
            _ => eprintln!("[!] {}", msg),
        }
    }
}
