//! Main entry point for ytsig CLI

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ytsig::cli::args::load_formats;
use ytsig::cli::{Args, Command, OutputFormatter, VerbosityLevel};
use ytsig::{Cipher, DenoEngine, PlayerClient};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let formatter = OutputFormatter::new(args.verbosity_level());

    if let Err(e) = init_logging(args.verbosity_level()) {
        formatter.error(&format!("{:#}", e));
        std::process::exit(2);
    }

    if let Err(e) = run(&args, &formatter).await {
        formatter.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(args: &Args, formatter: &OutputFormatter) -> anyhow::Result<()> {
    debug!("Starting ytsig with args: {:?}", args);

    let client = PlayerClient::with_config(args.http_config())
        .context("Failed to build HTTP client")?;
    let cipher = Cipher::with_parts(Arc::new(client), Arc::new(DenoEngine::new()))
        .with_config(args.cipher_config());

    match &args.command {
        Command::Decipher { player, formats } => {
            let start_time = Instant::now();
            let mut formats = load_formats(formats)
                .with_context(|| format!("Failed to read formats from {}", formats.display()))?;
            info!("Loaded {} format(s)", formats.len());

            let deciphered = cipher
                .decipher_formats(&mut formats, player)
                .await
                .context("Failed to decipher formats")?;

            formatter.print_formats(&deciphered)?;
            formatter.print_summary(deciphered.len(), formats.len(), start_time.elapsed());
        }
        Command::Extract { player } => {
            let functions = cipher
                .get_functions(player)
                .await
                .with_context(|| format!("Failed to extract functions from {}", player))?;

            formatter.print_functions(&functions)?;
            formatter.info(&format!("Extracted {} function(s)", functions.len()));
        }
    }

    Ok(())
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    // RUST_LOG wins over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.log_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
