// src/main.rs

//! scenario-agent
//!
//! Entry point for the scenario-agent CLI.
//!
//! This binary replays timed test scenarios (YAML timelines of shell actions)
//! against a system under test and records what happened for a downstream
//! judge. It delegates all real work to the `runner` module.
//!
//! Responsibilities of this file:
//! - Parse CLI arguments
//! - Install the log subscriber
//! - Initialise the async runtime
//! - Hand off execution to the runner

mod cli;
mod config;
mod engine;
mod error;
mod metrics;
mod run_id;
mod runner;
mod scenario;
mod sinks;
mod util;

use anyhow::Result;
use clap::Parser;

/// Program entry point.
///
/// Uses Tokio because actions are child processes awaited asynchronously and
/// live runs sleep between events.
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments (run / validate / init / flags)
    let cli = cli::Cli::parse();

    // Logs go to stderr; stdout carries the run summary only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();

    // Delegate execution to the runner
    runner::run(cli).await
}
