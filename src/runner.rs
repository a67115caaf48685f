// src/runner.rs

use crate::cli::{flag_pair, Cli, Command};
use crate::config::Config;
use crate::engine::action::{default_shell, ShellActionRunner};
use crate::engine::events::RunState;
use crate::engine::run::{run_scenario, RunContext, RunOptions};
use crate::engine::state::FileStateStore;
use crate::engine::summary::ScenarioRun;
use crate::engine::time::SystemClock;
use crate::engine::{FailurePolicy, TimingMode, ValidationReport, WriteMode};
use crate::error::EngineError;
use crate::scenario::Scenario;
use crate::sinks::logging::TracingEventSink;
use crate::util::ensure_dir;

use anyhow::{bail, Context, Result};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(Path::new(".")),

        Command::Validate { scenario, config } => validate(&config, scenario),

        Command::Run {
            config,
            scenario,
            output_jsonl,
            log_dir,
            base_start,
            dry_run,
            no_dry_run,
            append,
            no_append,
            reset_state,
            no_reset_state,
            state_path,
            state_template,
            on_failure,
            format,
        } => {
            let cfg = Config::load_or_default(&config)?;
            let s = &cfg.scenario_agent;

            // CLI overrides
            let opts = RunOptions {
                scenario: or_config(scenario, cfg.scenario_path())?,
                run_log: or_config(output_jsonl, cfg.run_log_path())?,
                detail_dir: or_config(log_dir, cfg.detail_dir())?,
                base_override: base_start.or_else(|| s.base_start.clone()),
                timing: TimingMode::from_dry_run(
                    flag_pair(dry_run, no_dry_run)
                        .or(s.dry_run)
                        .unwrap_or(false),
                ),
                write_mode: WriteMode::from_append(
                    flag_pair(append, no_append).or(s.append).unwrap_or(false),
                ),
                failure_policy: on_failure
                    .as_deref()
                    .map(parse_failure_policy)
                    .or(s.on_failure)
                    .unwrap_or_default(),
                reset_before_run: flag_pair(reset_state, no_reset_state)
                    .unwrap_or(s.state_reset.enabled),
                state_template: Some(or_config(state_template, cfg.state_template())?),
            };

            let actions = ShellActionRunner::new(s.shell.clone().unwrap_or_else(default_shell))
                .with_workdir(cfg.workdir()?)
                .with_env(s.env.clone());
            let mut state = FileStateStore::new(or_config(state_path, cfg.state_path())?);
            let mut sink = TracingEventSink;
            let clock = SystemClock;

            tracing::debug!(?opts, state_path = %state.target().display(), "resolved run options");

            let result = run_scenario(
                &opts,
                RunContext {
                    actions: &actions,
                    clock: &clock,
                    state: &mut state,
                    sink: &mut sink,
                },
            )
            .await;

            let run = match result {
                Ok(run) => run,
                Err(EngineError::Validation(report)) => {
                    print_report(&opts.scenario, &report);
                    bail!("Scenario validation failed");
                }
                Err(e) => {
                    let context = failure_context(&e);
                    tracing::error!(kind = e.kind(), error = %e, "{}", context);
                    return Err(e).context(context);
                }
            };

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string(&run)?),
                _ => println!(
                    "{}",
                    format_simple_summary(&run, &opts.run_log, should_use_color())
                ),
            }

            if !run.is_finished() {
                bail!(
                    "Run aborted: {}",
                    run.error.as_deref().unwrap_or("unknown reason")
                );
            }
            Ok(())
        }
    }
}

fn or_config(cli: Option<PathBuf>, from_config: Result<PathBuf>) -> Result<PathBuf> {
    match cli {
        Some(path) => Ok(path),
        None => from_config,
    }
}

/// Persistence can fail before the first event or after the last one;
/// everything else surfacing here stops the run before it starts.
fn failure_context(err: &EngineError) -> &'static str {
    match err {
        EngineError::Persistence(_) => "Run output could not be written",
        _ => "Run did not start",
    }
}

fn parse_failure_policy(raw: &str) -> FailurePolicy {
    match raw {
        "abort" => FailurePolicy::Abort,
        _ => FailurePolicy::Continue,
    }
}

/* ---------------- validate ---------------- */

fn validate(config: &Path, scenario: Option<PathBuf>) -> Result<()> {
    let cfg = Config::load_or_default(config)?;
    let path = or_config(scenario, cfg.scenario_path())?;

    match Scenario::load(&path) {
        Ok(scenario) => {
            let use_color = should_use_color();
            println!(
                "{} {} ({}): {} events, valid",
                paint("✔", "32", use_color),
                scenario.name,
                path.display(),
                scenario.events.len()
            );
            Ok(())
        }
        Err(EngineError::Validation(report)) => {
            print_report(&path, &report);
            bail!("Scenario validation failed");
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(path: &Path, report: &ValidationReport) {
    eprintln!("Invalid scenario {}:", path.display());
    for err in &report.errors {
        eprintln!("✖ {}", err);
    }
}

/* ---------------- output ---------------- */

fn format_simple_summary(run: &ScenarioRun, run_log: &Path, use_color: bool) -> String {
    let (mark, color) = match run.status {
        RunState::Finished if run.failed_count == 0 => ("✔", "32"),
        RunState::Finished => ("!", "33"),
        _ => ("✖", "31"),
    };

    let mut out = format!(
        "{} {} ({}) {}: {}/{} events executed, {} failed\n",
        paint(mark, color, use_color),
        run.scenario_name,
        run.case_id,
        status_label(run.status),
        run.executed_count,
        run.event_count,
        run.failed_count
    );

    for record in &run.records {
        let status = if record.failed() {
            paint("FAILED", "31", use_color)
        } else {
            paint("COMPLETED", "32", use_color)
        };
        out.push_str(&format!(
            "  #{} {} {} {}\n",
            record.index,
            record.scheduled_at.log_format(),
            status,
            record.action
        ));
    }

    if let Some(err) = &run.error {
        out.push_str(&format!("  error: {}\n", err));
    }

    out.push_str(&format!("  run log:    {}\n", run_log.display()));
    out.push_str(&format!("  detail log: {}", run.log_file));
    out
}

fn status_label(status: RunState) -> &'static str {
    match status {
        RunState::NotStarted => "not started",
        RunState::Running => "running",
        RunState::Finished => "finished",
        RunState::Aborted => "aborted",
    }
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{}m{}\x1b[0m", color, text)
    } else {
        text.to_string()
    }
}

/* -------------------------------------------------
   init_scaffold + defaults
-------------------------------------------------- */

fn init_scaffold(root: &Path) -> Result<()> {
    let files = [
        ("settings.yaml", default_settings_yaml()),
        ("scenario/normal_flow.yaml", default_scenario_yaml()),
        ("templates/queue_initial.json", default_queue_template()),
    ];

    for (rel, content) in files {
        let path = root.join(rel);
        if path.exists() {
            eprintln!("{} already exists (skipping)", rel);
            continue;
        }
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&path, content.trim_start())
            .with_context(|| format!("Failed to write {:?}", path))?;
        eprintln!("Created {}", rel);
    }

    Ok(())
}

fn default_settings_yaml() -> &'static str {
    r#"
scenario_agent:
  scenario: ./scenario/normal_flow.yaml
  output_jsonl: ./log/agent_runs.jsonl
  log_dir: ./log/agent_cases
  base_start: null
  dry_run: true
  append: false
  on_failure: continue
  shell: [sh, -c]
  workdir: null
  env: {}
  state_reset:
    enabled: true
    state_path: ./queue.json
    template: ./templates/queue_initial.json
"#
}

fn default_scenario_yaml() -> &'static str {
    r#"
id: normal-001
name: Normal Flow
expected_label: PASS
kind: normal
description: Three customers arrive and are served in order.
events:
  - after_seconds: 0
    action: echo "customer A arrives"
    message: first arrival
  - after_seconds: 5
    action: echo "customer B arrives"
  - after_seconds: 15
    action: echo "customer C arrives"
"#
}

fn default_queue_template() -> &'static str {
    r#"
{"orders": [], "count": 0}
"#
}
