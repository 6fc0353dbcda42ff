//! Photosweep - bulk download or delete iCloud photos by date
//!
#![doc = "Photosweep - bulk download or delete iCloud photos by date"]
#![doc = "Main entry point for the photosweep command-line tool."]

use std::process::ExitCode;

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use photosweep::cli::{Cli, Commands};
use photosweep::commands;
use photosweep::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Run failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(&cli.config)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Download { date, output_dir } => {
            tracing::info!("Starting download of photos taken on or before {}", date);
            commands::download::run_download(config, date, &output_dir).await?;
            Ok(())
        }
        Commands::Delete { date } => {
            tracing::info!("Starting deletion of photos taken on or before {}", date);
            commands::delete::run_delete(config, date).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` takes precedence; otherwise only warnings are shown unless
/// `--verbose` is given.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "photosweep=debug"
    } else {
        "photosweep=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
