//! In-memory doubles and fixtures shared by the engine's unit tests.

use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::engine::action::{ActionOutput, ActionRunner};
use crate::engine::events::{EventState, RunState};
use crate::engine::recorder::RecordSink;
use crate::engine::state::StateStore;
use crate::engine::summary::ScenarioRun;
use crate::engine::time::{Clock, TimeBasis, Timestamp};
use crate::engine::ExecutionRecord;
use crate::error::EngineError;
use crate::run_id::RunId;
use crate::scenario::{Event, EventAction, Scenario, Trigger};

/// A clock frozen at one instant, in whatever basis is asked for.
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn at(raw: &str) -> Self {
        Self {
            now: Timestamp::parse(raw).expect("fixture timestamp").value(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self, basis: TimeBasis) -> Timestamp {
        Timestamp::new(basis, self.now)
    }
}

/// Records every command; commands starting with `fail` exit 1.
#[derive(Default)]
pub struct ScriptedActionRunner {
    calls: RefCell<Vec<String>>,
}

impl ScriptedActionRunner {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ActionRunner for ScriptedActionRunner {
    async fn run(&self, command: &str) -> ActionOutput {
        self.calls.borrow_mut().push(command.to_string());
        let success = !command.starts_with("fail");

        ActionOutput {
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            stdout: format!("ran {}\n", command),
            ..ActionOutput::default()
        }
    }
}

/// Shared state held in memory. Templates are looked up by path.
#[derive(Default)]
pub struct MemoryStateStore {
    templates: HashMap<PathBuf, String>,
    pub document: Option<String>,

    /// Every reset attempt, successful or not.
    pub resets: Vec<PathBuf>,
}

impl MemoryStateStore {
    pub fn with_template(path: &str, content: &str) -> Self {
        let mut store = Self::default();
        store
            .templates
            .insert(PathBuf::from(path), content.to_string());
        store
    }
}

impl StateStore for MemoryStateStore {
    fn reset(&mut self, template: &Path) -> Result<(), EngineError> {
        self.resets.push(template.to_path_buf());
        let content = self.templates.get(template).ok_or_else(|| {
            EngineError::StateReset(format!("No such template: {}", template.display()))
        })?;
        self.document = Some(content.clone());
        Ok(())
    }
}

/// Keeps records in memory; can be told to fail on one event index.
#[derive(Default)]
pub struct MemoryRecordSink {
    pub records: Vec<ExecutionRecord>,
    pub fail_at: Option<usize>,
}

impl RecordSink for MemoryRecordSink {
    fn persist(&mut self, record: &ExecutionRecord) -> Result<(), EngineError> {
        if self.fail_at == Some(record.index) {
            return Err(EngineError::Persistence("disk full".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }
}

/* ---------------- fixtures ---------------- */

pub fn event_after(index: usize, seconds: f64, cmd: &str) -> Event {
    Event {
        index,
        trigger: Trigger::AfterSeconds(seconds),
        action: EventAction::Command(cmd.to_string()),
        message: String::new(),
    }
}

pub fn event_at(index: usize, at: Timestamp, cmd: &str) -> Event {
    Event {
        index,
        trigger: Trigger::At(at),
        action: EventAction::Command(cmd.to_string()),
        message: String::new(),
    }
}

pub fn event_reset(index: usize, template: Option<&str>) -> Event {
    Event {
        index,
        trigger: Trigger::AfterSeconds(0.0),
        action: EventAction::ResetState {
            template: template.map(PathBuf::from),
        },
        message: String::new(),
    }
}

pub fn scenario_with(events: Vec<Event>) -> Scenario {
    let mut metadata = BTreeMap::new();
    metadata.insert("kind".to_string(), serde_json::json!("normal"));

    Scenario {
        id: "case-1".to_string(),
        name: "Normal Flow".to_string(),
        expected_label: "PASS".to_string(),
        start_at: None,
        basis: None,
        metadata,
        events,
        source: PathBuf::from("scenario/inline.yaml"),
    }
}

pub fn record(index: usize, cmd: &str, success: bool) -> ExecutionRecord {
    let at = Timestamp::parse("2025-01-01T10:00:00").expect("fixture timestamp");

    ExecutionRecord {
        index,
        action: format!("cmd={}", cmd),
        message: String::new(),
        scheduled_at: at,
        fired_at: at,
        state: if success {
            EventState::Completed
        } else {
            EventState::Failed
        },
        outcome: ActionOutput {
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            ..ActionOutput::default()
        },
    }
}

pub fn sample_run() -> ScenarioRun {
    let at = Timestamp::parse("2025-01-01T10:00:00").expect("fixture timestamp");
    let utc = Timestamp::parse("2025-01-01T01:00:00Z").expect("fixture timestamp");
    let mut metadata = BTreeMap::new();
    metadata.insert("kind".to_string(), serde_json::json!("normal"));

    ScenarioRun {
        run_id: RunId::new(),
        case_id: "case-1".to_string(),
        scenario_name: "Normal Flow".to_string(),
        scenario_file: "scenario/normal_flow.yaml".to_string(),
        expected_label: "PASS".to_string(),
        metadata,
        status: RunState::Finished,
        base_time: at,
        run_started: utc,
        run_completed: utc,
        event_count: 1,
        executed_count: 1,
        failed_count: 0,
        log_file: "log/agent_cases/normal-flow.log".to_string(),
        generated_log: String::new(),
        records: vec![record(1, "echo A", true)],
        error: None,
    }
}
