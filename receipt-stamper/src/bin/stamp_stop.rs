use std::process::{Command, ExitCode};

use anyhow::{bail, Context};
use clap::Parser;
use receipt_stamper::{
    configuration::get_configuration,
    pid,
    telemetry::{get_subscriber, init_subscriber},
};

/// Stops a running stamp-batch job through its pid file.
#[derive(Parser, Debug)]
#[command(name = "stamp-stop", version, about)]
struct Args {
    /// Configuration file name, without extension
    #[arg(short, long, default_value = "configuration")]
    config: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let subscriber = get_subscriber(
        env!("CARGO_BIN_NAME").into(),
        args.log_level.clone(),
        std::io::stdout,
    );
    init_subscriber(subscriber);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Could not stop the batch job");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let settings = get_configuration(&args.config).context("Failed to read configuration.")?;
    let pid_file = &settings.batch.pid_file;
    let pid = pid::read(pid_file)?;

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .context("Failed to run kill")?;
    if !status.success() {
        bail!("kill -TERM {} exited with {}", pid, status);
    }

    tracing::info!(pid, "Sent SIGTERM to batch job");
    pid::clear(pid_file)?;
    Ok(())
}
