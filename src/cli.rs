use crate::{
    dataset, orchestrator, pass, CaptureError, Config, DatasetKind, DeviceProfile, MergeOptions,
    OutputMode, PassSpec,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "evidence-capture")]
#[command(about = "Batch evidence capture for suspect URL datasets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge input tables into one deduplicated master dataset
    Merge {
        #[arg(long, help = "Directory of input tables")]
        input_dir: PathBuf,

        #[arg(long, help = "Merged dataset output path")]
        output_file: PathBuf,

        #[arg(
            long,
            default_value_t = 4,
            allow_hyphen_values = true,
            help = "0-based dedup-key column; negative disables deduplication"
        )]
        key_column: i64,

        #[arg(long, help = "Rewrite the key column to canonical domain form")]
        canonicalize: bool,
    },

    /// Run one capture pass over a master dataset
    Capture {
        #[arg(value_enum, help = "What to capture for each row")]
        mode: CaptureMode,

        #[arg(long, help = "Master dataset path")]
        csv: PathBuf,

        #[arg(long, help = "Output directory for this pass")]
        output: PathBuf,

        #[arg(long, help = "Use the mobile device profile")]
        mobile: bool,

        #[arg(long = "no-headless", help = "Show the browser window")]
        no_headless: bool,

        #[arg(long, help = "Dataset is the domain-oriented variant")]
        domain_variant: bool,
    },

    /// Merge and run every device/output combination to completion
    Run {
        #[arg(long, help = "Directory of input tables")]
        input_dir: Option<PathBuf>,

        #[arg(long, help = "Root directory for the run output tree")]
        output: Option<PathBuf>,

        #[arg(long = "no-headless", help = "Show the browser windows")]
        no_headless: bool,
    },

    /// Validate a configuration file
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CaptureMode {
    Screenshot,
    Html,
}

impl From<CaptureMode> for OutputMode {
    fn from(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Screenshot => OutputMode::Screenshot,
            CaptureMode::Html => OutputMode::Html,
        }
    }
}

pub struct CliRunner {
    pub config: Config,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(self, command: Commands) -> Result<(), CaptureError> {
        match command {
            Commands::Merge {
                input_dir,
                output_file,
                key_column,
                canonicalize,
            } => {
                let rows = dataset::merge_tables(
                    &input_dir,
                    &output_file,
                    &MergeOptions::from_key_index(key_column, canonicalize),
                )?;
                println!("{} rows merged into {}", rows, output_file.display());
                Ok(())
            }

            Commands::Capture {
                mode,
                csv,
                output,
                mobile,
                no_headless,
                domain_variant,
            } => {
                let mut config = self.config;
                if no_headless {
                    config.headless = false;
                }

                let spec = PassSpec {
                    dataset_path: csv,
                    kind: if domain_variant {
                        DatasetKind::Domain
                    } else {
                        DatasetKind::Subdomain
                    },
                    profile: if mobile {
                        DeviceProfile::Mobile
                    } else {
                        DeviceProfile::Desktop
                    },
                    mode: mode.into(),
                    output_dir: output,
                };

                // Row failures are internal to the pass; exit status stays
                // zero unless the pass itself could not run
                let report = pass::run_pass(&config, spec).await?;
                println!(
                    "Pass {} complete: {}/{} captured, {} failed, {} escalated",
                    report.label, report.succeeded, report.rows, report.failed, report.escalated
                );
                Ok(())
            }

            Commands::Run {
                input_dir,
                output,
                no_headless,
            } => {
                let mut config = self.config;
                if let Some(input_dir) = input_dir {
                    config.input_dir = input_dir;
                }
                if let Some(output) = output {
                    config.output_root = output;
                }
                if no_headless {
                    config.headless = false;
                }

                let report = orchestrator::run_batch(Arc::new(config)).await?;
                println!("{} rows merged", report.merged_rows);
                for pass_report in &report.passes {
                    println!(
                        "{}: {}/{} captured, {} failed, {} escalated",
                        pass_report.label,
                        pass_report.succeeded,
                        pass_report.rows,
                        pass_report.failed,
                        pass_report.escalated
                    );
                }
                println!("Output tree: {}", report.run_dir.display());

                // A pass abort is a configuration failure; surface the first
                match report.pass_failures.into_iter().next() {
                    Some((label, error)) => {
                        Err(CaptureError::ConfigurationError(format!(
                            "Pass {label} aborted: {error}"
                        )))
                    }
                    None => Ok(()),
                }
            }

            Commands::Validate { config } => {
                println!("Validating configuration: {}", config.display());

                let content = std::fs::read_to_string(&config)?;
                let parsed: Config = serde_json::from_str(&content)?;
                parsed.validate()?;

                println!("Configuration is valid:");
                println!("  Input directory: {}", parsed.input_dir.display());
                println!("  Output root: {}", parsed.output_root.display());
                println!("  Key column: {}", parsed.key_column);
                println!("  Retry attempts: {}", parsed.retry_attempts);
                println!(
                    "  Desktop viewport: {}x{}",
                    parsed.desktop_viewport.width, parsed.desktop_viewport.height
                );
                println!(
                    "  Mobile viewport: {}x{}",
                    parsed.mobile_viewport.width, parsed.mobile_viewport.height
                );
                Ok(())
            }
        }
    }
}

/// Load configuration from the optional file, apply CLI overrides, validate
pub async fn load_config(args: &Cli) -> Result<Config, CaptureError> {
    let mut config = if let Some(config_path) = &args.config {
        let content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&content)?
    } else {
        Config::default()
    };

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    config.validate()?;
    info!("Configuration loaded");
    Ok(config)
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
