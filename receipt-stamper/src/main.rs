use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use receipt_stamper::{
    configuration::get_configuration,
    pid, run_batch,
    telemetry::{get_subscriber, init_subscriber},
};

/// Stamps every remaining content item, pausing between stamps.
#[derive(Parser, Debug)]
#[command(name = "stamp-batch", version, about)]
struct Args {
    /// Configuration file name, without extension
    #[arg(short, long, default_value = "configuration")]
    config: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let subscriber = get_subscriber(
        env!("CARGO_BIN_NAME").into(),
        args.log_level.clone(),
        std::io::stdout,
    );
    init_subscriber(subscriber);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Batch run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = get_configuration(&args.config).context("Failed to read configuration.")?;

    let pid_file = settings.batch.pid_file.clone();
    let pid = pid::record(&pid_file)?;
    tracing::info!(pid, file = %pid_file.display(), "Recorded process id");

    let outcome = run_batch(&settings).await;
    if let Err(e) = pid::clear(&pid_file) {
        tracing::warn!(error = %e, "Could not remove pid file");
    }

    let summary = outcome?;
    tracing::info!(stamped = summary.stamped, cursor = summary.cursor, "Batch run finished");
    Ok(())
}
