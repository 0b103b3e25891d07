//! Failure classification and the per-pass audit log
//!
//! Every row resolves to a [`CaptureOutcome`] value; nothing raises past the
//! row boundary. Failures are appended to a per-pass log file opened in
//! append mode, so a crashed-and-restarted pass keeps its prior entries.
//! Blocked URLs on recognized platforms additionally go to a dedicated list
//! for manual escalation.

use crate::{CaptureError, PreflightVerdict};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Result of executing one capture task
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Success { output_path: PathBuf },
    PreflightRejected { verdict: PreflightVerdict },
    CaptureFailed { error_detail: String },
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Success { .. })
    }
}

/// Append-only failure log owned exclusively by one capture pass
///
/// One log file per pass avoids any write contention between passes. Entries
/// are never read back by the system; append order is chronological order.
pub struct PassLog {
    error_log: std::fs::File,
    escalation_log: std::fs::File,
    failures: usize,
    escalations: usize,
}

impl PassLog {
    pub fn open(dir: &Path, pass_label: &str) -> Result<Self, CaptureError> {
        std::fs::create_dir_all(dir)?;

        let open_append = |name: String| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        };

        Ok(Self {
            error_log: open_append(format!("{pass_label}_errors.log"))?,
            escalation_log: open_append(format!("{pass_label}_blocked_urls.txt"))?,
            failures: 0,
            escalations: 0,
        })
    }

    /// Append one human-readable failure record; never raises further
    pub fn record_failure(&mut self, domain: &str, url: &str, detail: &str) {
        self.failures += 1;
        if let Err(e) = writeln!(self.error_log, "[{domain}] {url}: {detail}") {
            warn!("Failed to append error log entry for {}: {}", url, e);
        }
    }

    /// Track a blocked recognized-platform URL for manual follow-up
    pub fn record_escalation(&mut self, url: &str) {
        self.escalations += 1;
        if let Err(e) = writeln!(self.escalation_log, "{url}") {
            warn!("Failed to append escalation entry for {}: {}", url, e);
        }
    }

    /// Route one non-success outcome to the right log(s)
    pub fn record_outcome(&mut self, domain: &str, url: &str, outcome: &CaptureOutcome) {
        match outcome {
            CaptureOutcome::Success { .. } => {}
            CaptureOutcome::PreflightRejected { verdict } => {
                self.record_failure(domain, url, &verdict.detail());
                if matches!(verdict, PreflightVerdict::BlockedKnownPlatform { .. }) {
                    self.record_escalation(url);
                }
            }
            CaptureOutcome::CaptureFailed { error_detail } => {
                self.record_failure(domain, url, error_detail);
            }
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn escalations(&self) -> usize {
        self.escalations
    }
}
