use crate::engine::mode::TimingMode;
use crate::engine::time::Timestamp;
use crate::run_id::RunId;
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

/// Per-event lifecycle: `Pending -> Waiting -> Firing -> (Completed | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Pending,
    Waiting,
    Firing,
    Completed,
    Failed,
}

/// Run lifecycle: `NotStarted -> Running -> (Finished | Aborted)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Finished,
    Aborted,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionEventKind {
    StateReset {
        template: PathBuf,
    },
    RunStarted {
        scenario: String,
        base_time: Timestamp,
        timing: TimingMode,
        events: usize,
    },
    EventWaiting {
        index: usize,
        scheduled_at: Timestamp,
    },
    EventFiring {
        index: usize,
        fired_at: Timestamp,
    },
    EventCompleted {
        index: usize,
    },
    EventFailed {
        index: usize,
        reason: String,
    },
    RunFinished {
        executed: usize,
        failed: usize,
    },
    RunAborted {
        reason: String,
    },
}

impl ExecutionEventKind {
    /// The event state this transition enters, if it is an event transition.
    pub fn event_state(&self) -> Option<(usize, EventState)> {
        match self {
            ExecutionEventKind::EventWaiting { index, .. } => Some((*index, EventState::Waiting)),
            ExecutionEventKind::EventFiring { index, .. } => Some((*index, EventState::Firing)),
            ExecutionEventKind::EventCompleted { index } => Some((*index, EventState::Completed)),
            ExecutionEventKind::EventFailed { index, .. } => Some((*index, EventState::Failed)),
            _ => None,
        }
    }

    /// The run state this transition enters, if it is a run transition.
    pub fn run_state(&self) -> Option<RunState> {
        match self {
            ExecutionEventKind::RunStarted { .. } => Some(RunState::Running),
            ExecutionEventKind::RunFinished { .. } => Some(RunState::Finished),
            ExecutionEventKind::RunAborted { .. } => Some(RunState::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ExecutionEvent {
    pub run_id: RunId,
    #[serde(flatten)]
    pub kind: ExecutionEventKind,
    pub timestamp: SystemTime,
}

pub fn execution_event(run_id: &RunId, kind: ExecutionEventKind) -> ExecutionEvent {
    ExecutionEvent {
        run_id: run_id.clone(),
        kind,
        timestamp: SystemTime::now(),
    }
}
