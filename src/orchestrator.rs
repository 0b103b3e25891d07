//! Batch orchestration: merge once, fan out capture passes, join all
//!
//! One tokio task per pass, launched together and joined together. Passes
//! share no mutable state: each owns its browser, its output directory and
//! its log file, so no locking is needed between them. Per-row failures stay
//! inside their pass; only pass-level configuration errors surface here, and
//! they never abort sibling passes.

use crate::{
    dataset, pass, utils, CaptureError, Config, DatasetKind, DeviceProfile, MergeOptions,
    OutputMode, PassReport, PassSpec,
};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Final count-based summary of one batch run
#[derive(Debug)]
pub struct BatchReport {
    pub merged_rows: usize,
    pub run_dir: PathBuf,
    pub passes: Vec<PassReport>,
    /// Pass-level fatal errors (configuration class); per-row failures are
    /// inside the pass reports
    pub pass_failures: Vec<(String, CaptureError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.pass_failures.is_empty()
    }
}

/// Verify the browser capability exists before any pass is spawned
///
/// This is the one fatal pre-flight-time check allowed to stop the whole
/// batch.
pub fn ensure_chrome_available(config: &Config) -> Result<(), CaptureError> {
    if let Some(path) = &config.chrome_path {
        if std::path::Path::new(path).exists() {
            return Ok(());
        }
        return Err(CaptureError::MissingCapability(format!(
            "Chrome executable not found at {path}"
        )));
    }

    const CANDIDATES: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path_var) {
        for name in CANDIDATES {
            if dir.join(name).is_file() {
                return Ok(());
            }
        }
    }

    Err(CaptureError::MissingCapability(
        "No Chrome/Chromium executable found on PATH; set chrome_path".into(),
    ))
}

/// Merge both master dataset variants into the work directory
///
/// Returns the primary dataset's row count. Both variants come from the same
/// input tables; the domain variant canonicalizes the key column before
/// deduplicating, so subdomains of one registrable domain collapse to one
/// row.
pub fn merge_datasets(config: &Config) -> Result<usize, CaptureError> {
    info!("Merging input tables from {}", config.input_dir.display());

    let primary = config.work_dir.join(DatasetKind::Subdomain.file_name());
    let rows = dataset::merge_tables(
        &config.input_dir,
        &primary,
        &MergeOptions::from_key_index(config.key_column, false),
    )?;
    info!("{} rows merged into {}", rows, primary.display());

    let domain = config.work_dir.join(DatasetKind::Domain.file_name());
    let domain_rows = dataset::merge_tables(
        &config.input_dir,
        &domain,
        &MergeOptions::from_key_index(config.key_column, true),
    )?;
    info!("{} rows merged into {}", domain_rows, domain.display());

    Ok(rows)
}

/// Build the run-scoped output tree and the cross product of pass specs
fn plan_passes(config: &Config, run_dir: &std::path::Path) -> Vec<PassSpec> {
    let mut specs = Vec::new();

    for kind in [DatasetKind::Subdomain, DatasetKind::Domain] {
        for profile in [DeviceProfile::Desktop, DeviceProfile::Mobile] {
            for mode in [OutputMode::Screenshot, OutputMode::Html] {
                specs.push(PassSpec {
                    dataset_path: config.work_dir.join(kind.file_name()),
                    kind,
                    profile,
                    mode,
                    output_dir: run_dir.join(profile.dir_name()).join(mode.dir_name()),
                });
            }
        }
    }

    specs
}

/// Run one full batch: merge, fan out every pass, join, summarize
pub async fn run_batch(config: Arc<Config>) -> Result<BatchReport, CaptureError> {
    let started = Instant::now();

    ensure_chrome_available(&config)?;
    let merged_rows = merge_datasets(&config)?;

    let run_dir = config
        .output_root
        .join(format!("capture_{}", utils::run_timestamp()));
    let specs = plan_passes(&config, &run_dir);

    info!(
        "Launching {} capture passes under {}",
        specs.len(),
        run_dir.display()
    );

    // Fan-out/fan-in barrier: all passes spawned together, joined together
    let mut labels = Vec::new();
    let mut handles = Vec::new();
    for spec in specs {
        let config = config.clone();
        labels.push(spec.label());
        handles.push(tokio::spawn(async move { pass::run_pass(&config, spec).await }));
    }

    let mut passes = Vec::new();
    let mut pass_failures = Vec::new();

    for (label, result) in labels.into_iter().zip(join_all(handles).await) {
        match result {
            Ok(Ok(report)) => {
                info!("{} finished", report.label);
                passes.push(report);
            }
            Ok(Err(e)) => {
                error!("Pass {} aborted: {}", label, e);
                pass_failures.push((label, e));
            }
            Err(e) => {
                error!("Pass {} panicked: {}", label, e);
                pass_failures.push((label, CaptureError::CaptureFailed(e.to_string())));
            }
        }
    }

    let report = BatchReport {
        merged_rows,
        run_dir,
        passes,
        pass_failures,
    };

    let captured: usize = report.passes.iter().map(|p| p.succeeded).sum();
    let failed: usize = report.passes.iter().map(|p| p.failed).sum();
    info!(
        "Batch complete in {}: {} rows merged, {} captures, {} row failures, {} pass aborts",
        utils::format_duration(started.elapsed()),
        report.merged_rows,
        captured,
        failed,
        report.pass_failures.len()
    );

    Ok(report)
}
