// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Replays timed test scenarios against a system under test.
///
/// `settings.yaml` is optional. CLI flags override settings values,
/// settings override built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "scenario-agent", version, disable_help_subcommand = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one scenario timeline.
    Run {
        /// Path to settings file
        ///
        /// Defaults to ./settings.yaml (missing file is fine)
        #[arg(short, long, default_value = "settings.yaml")]
        config: PathBuf,

        /// Scenario YAML file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Run log (JSON Lines)
        #[arg(long)]
        output_jsonl: Option<PathBuf>,

        /// Directory for per-scenario detail logs
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Override the base time for relative events
        ///
        /// Example:
        /// --base-start "2025-01-01 10:00:00"
        #[arg(long)]
        base_start: Option<String>,

        /// Fire every event immediately, keeping scheduled times in the logs
        #[arg(long, overrides_with = "no_dry_run")]
        dry_run: bool,

        #[arg(long, overrides_with = "dry_run", hide = true)]
        no_dry_run: bool,

        /// Append to the run log instead of recreating it
        #[arg(long, overrides_with = "no_append")]
        append: bool,

        #[arg(long, overrides_with = "append", hide = true)]
        no_append: bool,

        /// Reset the shared state from its template before the first event
        #[arg(long, overrides_with = "no_reset_state")]
        reset_state: bool,

        #[arg(long, overrides_with = "reset_state", hide = true)]
        no_reset_state: bool,

        /// Shared state document to reset
        #[arg(long)]
        state_path: Option<PathBuf>,

        /// Template the shared state is reset from
        #[arg(long)]
        state_template: Option<PathBuf>,

        /// What to do after a failed action
        #[arg(long, value_parser = ["continue", "abort"])]
        on_failure: Option<String>,

        /// Summary format on stdout
        #[arg(long, value_parser = ["simple", "json"], default_value = "simple")]
        format: String,
    },

    /// Check a scenario file without running it.
    Validate {
        /// Scenario YAML file
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Path to settings file
        #[arg(short, long, default_value = "settings.yaml")]
        config: PathBuf,
    },

    /// Initialise a project scaffold.
    ///
    /// Creates:
    /// - settings.yaml
    /// - scenario/normal_flow.yaml
    /// - templates/queue_initial.json
    Init,
}

/// Resolve a `--flag` / `--no-flag` pair. `None` when neither was given.
pub fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
