//! Command-line entry point.
//!
//! Progress goes to stdout as JSON lines for a parent process to consume,
//! logs go to stderr (filter with `RUST_LOG`).

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use timelapse_deflicker::config::Args;
use timelapse_deflicker::progress::Progress;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            Progress::failed(&e).emit();
            return Err(e).context("could not read configuration");
        }
    };

    match timelapse_deflicker::run(&config) {
        Ok(summary) => {
            Progress::complete(summary.written, &summary.destination).emit();
            Ok(())
        }
        Err(e) => {
            Progress::failed(&e).emit();
            Err(e).context("deflicker run failed")
        }
    }
}
