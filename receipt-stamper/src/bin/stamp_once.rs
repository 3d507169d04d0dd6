use std::{process::ExitCode, time::Duration};

use anyhow::Context;
use clap::Parser;
use receipt_stamper::{
    configuration::get_configuration,
    run_once,
    telemetry::{get_subscriber, init_subscriber},
};

/// Stamps a single content item, for cron-style scheduling.
#[derive(Parser, Debug)]
#[command(name = "stamp-once", version, about)]
struct Args {
    /// Configuration file name, without extension
    #[arg(short, long, default_value = "configuration")]
    config: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to wait before stamping
    #[arg(long, default_value_t = 0)]
    delay_secs: u64,

    /// Content index to stamp; a random item when omitted
    #[arg(long)]
    index: Option<usize>,
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
            tracing::error!(error = ?e, "Stamp failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = get_configuration(&args.config).context("Failed to read configuration.")?;

    if args.delay_secs > 0 {
        tracing::info!("Waiting {}s before stamping", args.delay_secs);
        tokio::time::sleep(Duration::from_secs(args.delay_secs)).await;
    }

    let result = run_once(&settings, args.index).await?;
    tracing::info!(
        txid = %result.txid,
        function = result.function_name,
        sender = %result.sender_address,
        "Receipt stamped"
    );
    Ok(())
}
