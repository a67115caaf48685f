// src/engine/execute.rs

//! The scheduler.
//!
//! Walks the events strictly in document order, one at a time:
//! resolve time, wait (or not), fire, record. Nothing here sorts by time and
//! nothing runs concurrently.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::engine::action::{ActionOutput, ActionRunner};
use crate::engine::events::{execution_event, EventState, ExecutionEventKind, RunState};
use crate::engine::recorder::RecordSink;
use crate::engine::sink::EventSink;
use crate::engine::state::StateStore;
use crate::engine::time::{resolve_event_time, Clock, Timestamp};
use crate::engine::wait::Waiter;
use crate::engine::{ExecutionRecord, FailurePolicy};
use crate::error::EngineError;
use crate::run_id::RunId;
use crate::scenario::{Event, EventAction, Scenario};

/// Result of walking the timeline.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub status: RunState,

    /// Records that were persisted, in execution order.
    pub records: Vec<ExecutionRecord>,

    /// Why the run stopped early.
    pub error: Option<String>,
}

pub struct Executor<'a, A, W> {
    run_id: &'a RunId,
    actions: &'a A,
    waiter: &'a W,
    clock: &'a dyn Clock,
    state: &'a mut dyn StateStore,
    sink: &'a mut dyn EventSink,
    records: &'a mut dyn RecordSink,
    policy: FailurePolicy,
    default_template: Option<PathBuf>,
    run_state: RunState,
    event_states: Vec<EventState>,
}

impl<'a, A: ActionRunner, W: Waiter> Executor<'a, A, W> {
    pub fn new(
        run_id: &'a RunId,
        actions: &'a A,
        waiter: &'a W,
        clock: &'a dyn Clock,
        state: &'a mut dyn StateStore,
        sink: &'a mut dyn EventSink,
        records: &'a mut dyn RecordSink,
    ) -> Self {
        Self {
            run_id,
            actions,
            waiter,
            clock,
            state,
            sink,
            records,
            policy: FailurePolicy::default(),
            default_template: None,
            run_state: RunState::NotStarted,
            event_states: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Template used by `reset_state: true` events.
    pub fn with_default_template(mut self, template: Option<PathBuf>) -> Self {
        self.default_template = template;
        self
    }

    #[allow(dead_code)]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[allow(dead_code)]
    pub fn event_states(&self) -> &[EventState] {
        &self.event_states
    }

    /// Run every event of `scenario` against `base`.
    ///
    /// Action failures are recorded and, under [`FailurePolicy::Continue`],
    /// do not stop the run. Time resolution and persistence failures always
    /// do.
    pub async fn execute(&mut self, scenario: &Scenario, base: &Timestamp) -> ExecutionOutcome {
        self.event_states = vec![EventState::Pending; scenario.events.len()];
        self.emit(ExecutionEventKind::RunStarted {
            scenario: scenario.name.clone(),
            base_time: *base,
            timing: self.waiter.mode(),
            events: scenario.events.len(),
        });

        let mut records: Vec<ExecutionRecord> = Vec::with_capacity(scenario.events.len());

        for (slot, event) in scenario.events.iter().enumerate() {
            match self.step(scenario, slot, event, base).await {
                Ok(record) => {
                    let failed = record.failed();
                    records.push(record);

                    if failed && self.policy == FailurePolicy::Abort {
                        let reason = format!(
                            "Event {} failed and the failure policy is abort",
                            event.index
                        );
                        return self.abort(records, reason);
                    }
                }
                Err(e) => return self.abort(records, e.to_string()),
            }
        }

        let failed = records.iter().filter(|r| r.failed()).count();
        self.emit(ExecutionEventKind::RunFinished {
            executed: records.len(),
            failed,
        });

        ExecutionOutcome {
            status: RunState::Finished,
            records,
            error: None,
        }
    }

    async fn step(
        &mut self,
        scenario: &Scenario,
        slot: usize,
        event: &Event,
        base: &Timestamp,
    ) -> Result<ExecutionRecord, EngineError> {
        let scheduled = resolve_event_time(event, base)?;

        self.enter(
            slot,
            ExecutionEventKind::EventWaiting {
                index: event.index,
                scheduled_at: scheduled,
            },
        );
        self.waiter.wait_until(&scheduled).await;

        let fired = self.clock.now(scheduled.basis());
        self.enter(
            slot,
            ExecutionEventKind::EventFiring {
                index: event.index,
                fired_at: fired,
            },
        );

        let (action, outcome) = match &event.action {
            EventAction::Command(cmd) => (format!("cmd={}", cmd), self.actions.run(cmd).await),
            EventAction::ResetState { template } => {
                let template = resolve_template(scenario, template.as_deref())
                    .or_else(|| self.default_template.clone());
                self.reset_inline(template)
            }
        };

        let state = if outcome.success {
            EventState::Completed
        } else {
            EventState::Failed
        };

        let record = ExecutionRecord {
            index: event.index,
            action,
            message: event.message.clone(),
            scheduled_at: scheduled,
            fired_at: fired,
            state,
            outcome,
        };

        self.records.persist(&record)?;

        let transition = match state {
            EventState::Failed => ExecutionEventKind::EventFailed {
                index: event.index,
                reason: record.outcome.failure_reason(),
            },
            _ => ExecutionEventKind::EventCompleted { index: event.index },
        };
        self.enter(slot, transition);

        Ok(record)
    }

    fn reset_inline(&mut self, template: Option<PathBuf>) -> (String, ActionOutput) {
        let template = match template {
            Some(t) => t,
            None => {
                return (
                    "reset template=<unset>".to_string(),
                    ActionOutput::failed("No state template configured for reset_state"),
                )
            }
        };

        let started = Instant::now();
        let result = self.state.reset(&template);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match result {
            Ok(()) => ActionOutput {
                success: true,
                duration_ms,
                ..ActionOutput::default()
            },
            Err(e) => ActionOutput {
                duration_ms,
                ..ActionOutput::failed(e.to_string())
            },
        };

        (format!("reset template={}", template.display()), outcome)
    }

    fn abort(&mut self, records: Vec<ExecutionRecord>, reason: String) -> ExecutionOutcome {
        self.emit(ExecutionEventKind::RunAborted {
            reason: reason.clone(),
        });

        ExecutionOutcome {
            status: RunState::Aborted,
            records,
            error: Some(reason),
        }
    }

    /// Emit an event transition and track the state it enters.
    fn enter(&mut self, slot: usize, kind: ExecutionEventKind) {
        if let Some((_, state)) = kind.event_state() {
            self.event_states[slot] = state;
        }
        self.emit(kind);
    }

    fn emit(&mut self, kind: ExecutionEventKind) {
        if let Some(state) = kind.run_state() {
            self.run_state = state;
        }
        self.sink.emit(execution_event(self.run_id, kind));
    }
}

/// Inline templates are relative to the scenario file.
fn resolve_template(scenario: &Scenario, template: Option<&Path>) -> Option<PathBuf> {
    let template = template?;
    if template.is_absolute() {
        return Some(template.to_path_buf());
    }
    let base = scenario.source.parent().unwrap_or_else(|| Path::new(""));
    Some(base.join(template))
}
