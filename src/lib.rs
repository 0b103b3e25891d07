//! # Evidence Capture
//!
//! Batch evidence collection for anti-fraud takedown work. Suspect-URL
//! tables from multiple sources are merged into one deduplicated,
//! sequentially numbered master dataset, then every surviving URL is
//! captured as a screenshot and as raw page markup, under both a desktop
//! and a mobile device profile, with a lightweight reachability preflight
//! in front of every browser capture. One unreachable or hostile site never
//! aborts the batch: failures are classified, logged per pass, and skipped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evidence_capture::{orchestrator, Config};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let report = orchestrator::run_batch(Arc::new(config)).await?;
//!     println!("{} rows merged across {} passes", report.merged_rows, report.passes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ### Merge input tables
//! ```bash
//! evidence-capture merge --input-dir all_csv --output-file csv_stuff/total.csv
//! ```
//!
//! ### Single capture pass
//! ```bash
//! evidence-capture capture screenshot --csv csv_stuff/total.csv --output out/png --mobile
//! ```
//!
//! ### Full batch
//! ```bash
//! evidence-capture run --input-dir all_csv --output output
//! ```
//!
//! ## Testing
//!
//! End-to-end pass tests drive a real local Chrome/Chromium and are gated:
//! ```bash
//! cargo test --features integration_tests
//! ```

/// Configuration and settings for the capture batch
pub mod config;

/// Error types and the fatal/per-row taxonomy
pub mod error;

/// Dataset consolidation: merge, dedupe, canonicalize, renumber
pub mod dataset;

/// Reachability preflight with bounded retry
pub mod preflight;

/// Browser-driven screenshot and markup capture
pub mod capture;

/// Outcome classification and per-pass audit logging
pub mod outcome;

/// One sequential capture pass over the master dataset
pub mod pass;

/// Fan-out/fan-in batch orchestration
pub mod orchestrator;

/// Command-line interface implementation
pub mod cli;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use capture::*;
pub use cli::*;
pub use config::*;
pub use dataset::{MasterRecord, MergeOptions};
pub use error::*;
pub use orchestrator::*;
pub use outcome::*;
pub use pass::*;
pub use preflight::*;
pub use utils::*;
