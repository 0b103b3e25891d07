use clap::Parser;
use evidence_capture::{load_config, setup_logging, Cli, CliRunner};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting evidence-capture v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let runner = CliRunner::new(config);

    if let Err(e) = runner.run(args.command).await {
        // Per-row failures never reach here; this is configuration class
        error!("Fatal: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
