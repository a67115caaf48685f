use std::path::PathBuf;

use crate::{
    engine::{
        action::ActionRunner,
        events::{execution_event, ExecutionEventKind, RunState},
        execute::{ExecutionOutcome, Executor},
        recorder::{DetailLog, RunLog},
        sink::EventSink,
        state::StateStore,
        summary::ScenarioRun,
        time::{resolve_base, Clock, TimeBasis, Timestamp},
        wait::{NullWaiter, RealClockWaiter, Waiter},
        FailurePolicy, TimingMode, WriteMode,
    },
    error::EngineError,
    run_id::RunId,
    scenario::Scenario,
};

/// Everything one invocation needs to know, already resolved from settings
/// and flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub scenario: PathBuf,
    pub run_log: PathBuf,
    pub detail_dir: PathBuf,
    pub base_override: Option<String>,
    pub timing: TimingMode,
    pub write_mode: WriteMode,
    pub failure_policy: FailurePolicy,

    /// Reset the shared state once before the first event.
    pub reset_before_run: bool,

    /// Template for the pre-run reset and for `reset_state: true` events.
    pub state_template: Option<PathBuf>,
}

/// External collaborators for one run.
pub struct RunContext<'a, A> {
    pub actions: &'a A,
    pub clock: &'a dyn Clock,
    pub state: &'a mut dyn StateStore,
    pub sink: &'a mut dyn EventSink,
}

/// Execute one scenario end to end.
///
/// Order: load and validate, resolve the base time, optional state reset,
/// prepare both logs, walk the timeline, append the run summary.
///
/// Returns `Err` when the run never started (validation, base time, reset,
/// or log preparation failed; nothing has been executed) or when the final
/// summary line could not be written. A run that started and then aborted
/// comes back as `Ok` with `status: aborted`.
pub async fn run_scenario<A: ActionRunner>(
    opts: &RunOptions,
    mut ctx: RunContext<'_, A>,
) -> Result<ScenarioRun, EngineError> {
    // ---- load + validate ----
    let scenario = Scenario::load(&opts.scenario)?;
    tracing::info!(
        scenario = %scenario.name,
        id = %scenario.id,
        events = scenario.events.len(),
        "scenario loaded"
    );

    let run_id = RunId::new();
    let run_started = ctx.clock.now(TimeBasis::Utc);

    // ---- base time ----
    let base = resolve_base(&scenario, opts.base_override.as_deref(), ctx.clock)?;

    // ---- state reset ----
    if opts.reset_before_run {
        let template = opts.state_template.as_deref().ok_or_else(|| {
            EngineError::StateReset("State reset is enabled but no template is configured".into())
        })?;
        ctx.state.reset(template)?;
        ctx.sink.emit(execution_event(
            &run_id,
            ExecutionEventKind::StateReset {
                template: template.to_path_buf(),
            },
        ));
    }

    // ---- outputs ----
    let run_log = RunLog::new(&opts.run_log, opts.write_mode);
    run_log.prepare()?;
    let mut detail = DetailLog::create(&opts.detail_dir, &scenario.name)?;

    // ---- timeline ----
    let outcome = match opts.timing {
        TimingMode::DryRun => {
            execute_timeline(&NullWaiter, &run_id, &scenario, &base, opts, &mut ctx, &mut detail)
                .await
        }
        TimingMode::Live => {
            let waiter = RealClockWaiter::new(ctx.clock);
            execute_timeline(&waiter, &run_id, &scenario, &base, opts, &mut ctx, &mut detail)
                .await
        }
    };

    // ---- summary ----
    let run = summarise(
        run_id,
        &scenario,
        base,
        run_started,
        ctx.clock.now(TimeBasis::Utc),
        &detail,
        outcome,
    );
    if let Err(e) = run_log.append(&run) {
        tracing::error!(
            run_id = %run.run_id,
            status = ?run.status,
            error = %e,
            "timeline ran but the run summary was not recorded"
        );
        return Err(e);
    }

    tracing::info!(
        run_id = %run.run_id,
        status = ?run.status,
        executed = run.executed_count,
        failed = run.failed_count,
        run_log = %run_log.path().display(),
        detail_log = %run.log_file,
        "run recorded"
    );

    Ok(run)
}

async fn execute_timeline<A: ActionRunner, W: Waiter>(
    waiter: &W,
    run_id: &RunId,
    scenario: &Scenario,
    base: &Timestamp,
    opts: &RunOptions,
    ctx: &mut RunContext<'_, A>,
    detail: &mut DetailLog,
) -> ExecutionOutcome {
    let mut executor = Executor::new(
        run_id,
        ctx.actions,
        waiter,
        ctx.clock,
        &mut *ctx.state,
        &mut *ctx.sink,
        detail,
    )
    .with_policy(opts.failure_policy)
    .with_default_template(opts.state_template.clone());

    executor.execute(scenario, base).await
}

fn summarise(
    run_id: RunId,
    scenario: &Scenario,
    base: Timestamp,
    run_started: Timestamp,
    run_completed: Timestamp,
    detail: &DetailLog,
    outcome: ExecutionOutcome,
) -> ScenarioRun {
    let failed_count = outcome.records.iter().filter(|r| r.failed()).count();

    ScenarioRun {
        run_id,
        case_id: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        scenario_file: scenario.source.display().to_string(),
        expected_label: scenario.expected_label.clone(),
        metadata: scenario.metadata.clone(),
        status: outcome.status,
        base_time: base,
        run_started,
        run_completed,
        event_count: scenario.events.len(),
        executed_count: outcome.records.len(),
        failed_count,
        log_file: detail.path().display().to_string(),
        generated_log: detail.text(),
        records: outcome.records,
        error: match outcome.status {
            RunState::Aborted => outcome.error,
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::ShellActionRunner;
    use crate::engine::testing::{FixedClock, MemoryStateStore, ScriptedActionRunner};
    use crate::engine::time::SystemClock;
    use crate::sinks::collecting::CollectingEventSink;
    use std::path::Path;
    use std::time::{Duration, Instant};

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.path(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            path
        }

        fn options(&self, scenario: PathBuf) -> RunOptions {
            RunOptions {
                scenario,
                run_log: self.path("log/agent_runs.jsonl"),
                detail_dir: self.path("log/agent_cases"),
                base_override: None,
                timing: TimingMode::DryRun,
                write_mode: WriteMode::Recreate,
                failure_policy: FailurePolicy::Continue,
                reset_before_run: false,
                state_template: None,
            }
        }
    }

    fn count_lines(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    const THREE_EVENTS: &str = "\
id: normal-001
name: Normal Flow
expected_label: PASS
kind: normal
start_at: '2025-01-01T10:00:00'
events:
  - after_seconds: 0
    action: echo A
    message: first
  - after_seconds: 5
    action: echo B
  - at: '2025-01-01T10:00:15'
    action: echo C
";

    async fn run_with(
        opts: &RunOptions,
        actions: &ScriptedActionRunner,
        state: &mut MemoryStateStore,
    ) -> Result<ScenarioRun, EngineError> {
        let clock = FixedClock::at("2025-06-01T09:00:00");
        let mut sink = CollectingEventSink::new();
        run_scenario(
            opts,
            RunContext {
                actions,
                clock: &clock,
                state,
                sink: &mut sink,
            },
        )
        .await
    }

    #[tokio::test]
    async fn dry_run_of_three_events_is_instant_and_ordered() {
        let ws = Workspace::new();
        let mut opts = ws.options(ws.write("scenario/normal.yaml", THREE_EVENTS));
        opts.write_mode = WriteMode::Append;
        ws.write("log/agent_runs.jsonl", "{\"earlier\":true}\n");

        let actions = ScriptedActionRunner::default();
        let mut state = MemoryStateStore::default();

        let start = Instant::now();
        let run = run_with(&opts, &actions, &mut state).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        assert!(run.is_finished());
        assert_eq!(actions.calls(), vec!["echo A", "echo B", "echo C"]);

        let detail = std::fs::read_to_string(ws.path("log/agent_cases/normal-flow.log")).unwrap();
        let lines: Vec<&str> = detail.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("2025-01-01 10:00:00 #1 COMPLETED rc=0 cmd=echo A message=first"));
        assert!(lines[1].starts_with("2025-01-01 10:00:05 #2 COMPLETED rc=0 cmd=echo B"));
        assert!(lines[2].starts_with("2025-01-01 10:00:15 #3 COMPLETED rc=0 cmd=echo C"));

        assert_eq!(count_lines(&opts.run_log), 2);
        assert_eq!(run.generated_log, detail.trim_end());
    }

    #[tokio::test]
    async fn dry_run_collapses_an_hour_of_offsets() {
        let ws = Workspace::new();
        let scenario = ws.write(
            "scenario/long.yaml",
            "id: long\nname: long\nexpected_label: PASS\nevents:\n\
             - after_seconds: 0\n  action: echo start\n\
             - after_seconds: 1800\n  action: echo half\n\
             - after_seconds: 3600\n  action: echo end\n",
        );
        let opts = ws.options(scenario);

        let actions = ShellActionRunner::default();
        let clock = SystemClock;
        let mut state = MemoryStateStore::default();
        let mut sink = CollectingEventSink::new();

        let start = Instant::now();
        let run = run_scenario(
            &opts,
            RunContext {
                actions: &actions,
                clock: &clock,
                state: &mut state,
                sink: &mut sink,
            },
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(run.executed_count, 3);
        assert_eq!(run.records[2].outcome.stdout.trim(), "end");
    }

    #[tokio::test]
    async fn invalid_trigger_leaves_no_trace() {
        let both = "id: bad\nname: Bad Case\nexpected_label: FAIL\nevents:\n\
                    - after_seconds: 0\n  action: echo ok\n\
                    - after_seconds: 1\n  at: '2025-01-01T10:00:00'\n  action: echo both\n";
        let neither = "id: bad\nname: Bad Case\nexpected_label: FAIL\nevents:\n\
                       - after_seconds: 0\n  action: echo ok\n\
                       - action: echo untimed\n  message: no trigger\n";

        for (doc, code) in [(both, "TRIGGER_CONFLICT"), (neither, "TRIGGER_MISSING")] {
            let ws = Workspace::new();
            let mut opts = ws.options(ws.write("scenario/bad.yaml", doc));
            opts.reset_before_run = true;
            opts.state_template = Some(PathBuf::from("templates/queue.json"));

            let actions = ScriptedActionRunner::default();
            let mut state = MemoryStateStore::with_template("templates/queue.json", "{}");

            let err = run_with(&opts, &actions, &mut state).await.unwrap_err();
            match err {
                EngineError::Validation(report) => {
                    assert_eq!(report.errors.len(), 1, "{report}");
                    assert_eq!(report.errors[0].code, code);
                    assert_eq!(report.errors[0].event, Some(2));
                }
                other => panic!("expected validation error, got {other}"),
            }

            assert!(actions.calls().is_empty());
            assert!(state.resets.is_empty());
            assert!(state.document.is_none());
            assert!(!opts.run_log.exists());
            assert!(!opts.detail_dir.exists());
        }
    }

    #[tokio::test]
    async fn failed_reset_aborts_before_anything_runs() {
        let ws = Workspace::new();
        let mut opts = ws.options(ws.write("scenario/normal.yaml", THREE_EVENTS));
        opts.reset_before_run = true;
        opts.state_template = Some(PathBuf::from("templates/missing.json"));

        let actions = ScriptedActionRunner::default();
        let mut state = MemoryStateStore::default();

        let err = run_with(&opts, &actions, &mut state).await.unwrap_err();
        assert!(matches!(err, EngineError::StateReset(_)));
        assert!(actions.calls().is_empty());
        assert!(!opts.run_log.exists());
        assert!(!opts.detail_dir.exists());
    }

    #[tokio::test]
    async fn reset_and_recreate_runs_are_reproducible() {
        let ws = Workspace::new();
        let mut opts = ws.options(ws.write("scenario/normal.yaml", THREE_EVENTS));
        opts.reset_before_run = true;
        opts.state_template = Some(PathBuf::from("templates/queue.json"));

        let detail_path = ws.path("log/agent_cases/normal-flow.log");
        let mut snapshots = Vec::new();

        for _ in 0..2 {
            let actions = ScriptedActionRunner::default();
            let mut state =
                MemoryStateStore::with_template("templates/queue.json", "{\"count\":0}");

            run_with(&opts, &actions, &mut state).await.unwrap();

            assert_eq!(state.resets.len(), 1);
            assert_eq!(count_lines(&opts.run_log), 1);
            snapshots.push(std::fs::read(&detail_path).unwrap());
        }

        assert_eq!(snapshots[0], snapshots[1]);
    }

    #[tokio::test]
    async fn base_override_shifts_relative_events_only() {
        let ws = Workspace::new();
        let mut opts = ws.options(ws.write("scenario/normal.yaml", THREE_EVENTS));
        opts.base_override = Some("2025-01-01 09:00:00".to_string());

        let actions = ScriptedActionRunner::default();
        let run = run_with(&opts, &actions, &mut MemoryStateStore::default())
            .await
            .unwrap();

        let scheduled: Vec<String> = run
            .records
            .iter()
            .map(|r| r.scheduled_at.log_format())
            .collect();
        assert_eq!(
            scheduled,
            vec![
                "2025-01-01 09:00:00",
                "2025-01-01 09:00:05",
                "2025-01-01 10:00:15"
            ]
        );
    }

    #[tokio::test]
    async fn aborted_run_is_summarised_with_its_error() {
        let ws = Workspace::new();
        let scenario = ws.write(
            "scenario/abort.yaml",
            "id: abort\nname: Abort\nexpected_label: FAIL\nevents:\n\
             - after_seconds: 0\n  action: fail first\n\
             - after_seconds: 1\n  action: echo never\n",
        );
        let mut opts = ws.options(scenario);
        opts.failure_policy = FailurePolicy::Abort;

        let actions = ScriptedActionRunner::default();
        let run = run_with(&opts, &actions, &mut MemoryStateStore::default())
            .await
            .unwrap();

        assert_eq!(run.status, RunState::Aborted);
        assert_eq!(run.executed_count, 1);
        assert_eq!(run.event_count, 2);

        let raw = std::fs::read_to_string(&opts.run_log).unwrap();
        let line: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(line["status"], "aborted");
        assert!(line["error"].as_str().unwrap().contains("Event 1 failed"));
        assert_eq!(count_lines(&ws.path("log/agent_cases/abort.log")), 1);
    }

    #[tokio::test]
    async fn live_mode_waits_for_due_events_only() {
        let ws = Workspace::new();
        let mut opts = ws.options(ws.write("scenario/normal.yaml", THREE_EVENTS));
        opts.timing = TimingMode::Live;

        // every event is in the past relative to the system clock
        let actions = ScriptedActionRunner::default();
        let clock = SystemClock;
        let mut state = MemoryStateStore::default();
        let mut sink = CollectingEventSink::new();

        let start = Instant::now();
        let run = run_scenario(
            &opts,
            RunContext {
                actions: &actions,
                clock: &clock,
                state: &mut state,
                sink: &mut sink,
            },
        )
        .await
        .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(run.is_finished());
        assert_eq!(
            sink.run_transitions(),
            vec![RunState::Running, RunState::Finished]
        );
    }
}
