//! One capture pass: a full sequential sweep over the master dataset under
//! one fixed (device profile, output mode, dataset variant) combination
//!
//! Rows are processed strictly in dataset order, one browser, one row at a
//! time. A row failure is classified, logged, and skipped; only
//! configuration-level errors (missing dataset, unusable output directory,
//! browser launch) are fatal to the pass. A fixed cooldown follows every
//! row, success or failure, to avoid hammering the sites under
//! investigation.

use crate::{
    dataset, CaptureError, CaptureOutcome, CaptureSession, Config, DatasetKind, DeviceProfile,
    OutputMode, PassLog, PreflightChecker,
};
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{info, warn};

/// Everything one pass needs, fixed at orchestration time
#[derive(Debug, Clone)]
pub struct PassSpec {
    pub dataset_path: PathBuf,
    pub kind: DatasetKind,
    pub profile: DeviceProfile,
    pub mode: OutputMode,
    pub output_dir: PathBuf,
}

impl PassSpec {
    /// Stable label used for log filenames and progress lines
    pub fn label(&self) -> String {
        let kind = match self.kind {
            DatasetKind::Subdomain => "total",
            DatasetKind::Domain => "domain",
        };
        format!(
            "{}-{}-{}",
            self.profile.dir_name(),
            self.mode.dir_name(),
            kind
        )
    }
}

/// Count-based summary of one completed pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub label: String,
    pub rows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub escalated: usize,
}

/// Run one pass to completion
///
/// Per-row failures are internal: they are logged and do not surface as a
/// pass failure. The returned error is always configuration-level.
pub async fn run_pass(config: &Config, spec: PassSpec) -> Result<PassReport, CaptureError> {
    let label = spec.label();
    info!("Pass {} starting", label);

    std::fs::create_dir_all(&spec.output_dir).map_err(|e| {
        CaptureError::ConfigurationError(format!(
            "Cannot create output directory {}: {}",
            spec.output_dir.display(),
            e
        ))
    })?;

    // The master dataset is read-only input; the pass never mutates it
    let records =
        dataset::read_master(&spec.dataset_path, config.url_column, config.domain_column)?;

    let mut log = PassLog::open(&spec.output_dir, &label)?;
    let preflight = PreflightChecker::new(config)?;
    let session = CaptureSession::launch(
        config,
        spec.profile,
        spec.mode,
        spec.kind,
        spec.output_dir.clone(),
        &label,
    )
    .await?;

    let mut succeeded = 0usize;
    let mut processed = 0usize;

    for record in &records {
        if record.url.is_empty() {
            continue;
        }
        processed += 1;

        let outcome = process_row(&session, &preflight, record).await;
        match &outcome {
            CaptureOutcome::Success { output_path } => {
                succeeded += 1;
                info!(
                    "Pass {}: row {} captured to {}",
                    label,
                    record.sequence_id,
                    output_path.display()
                );
            }
            CaptureOutcome::PreflightRejected { verdict } => {
                warn!(
                    "Pass {}: row {} ({}) skipped: {}",
                    label,
                    record.sequence_id,
                    record.url,
                    verdict.detail()
                );
            }
            CaptureOutcome::CaptureFailed { error_detail } => {
                warn!(
                    "Pass {}: row {} ({}) failed: {}",
                    label, record.sequence_id, record.url, error_detail
                );
            }
        }
        log.record_outcome(&record.domain, &record.url, &outcome);

        // Politeness delay after every row, success or failure
        sleep(config.cooldown).await;
    }

    // Browser released exactly once, however many rows failed
    session.close().await;

    let report = PassReport {
        label: label.clone(),
        rows: processed,
        succeeded,
        failed: log.failures(),
        escalated: log.escalations(),
    };
    info!(
        "Pass {} complete: {}/{} captured, {} failed, {} escalated",
        label, report.succeeded, report.rows, report.failed, report.escalated
    );
    Ok(report)
}

/// Resolve one row to an outcome value; never raises past this boundary
async fn process_row(
    session: &CaptureSession,
    preflight: &PreflightChecker,
    record: &dataset::MasterRecord,
) -> CaptureOutcome {
    let verdict = preflight.check(&record.url).await;
    if !verdict.is_proceed() {
        return CaptureOutcome::PreflightRejected { verdict };
    }

    match session.capture_row(record).await {
        Ok(output_path) => CaptureOutcome::Success { output_path },
        Err(e) => CaptureOutcome::CaptureFailed {
            error_detail: e.to_string(),
        },
    }
}
