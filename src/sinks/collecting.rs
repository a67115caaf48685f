use crate::engine::events::{EventState, ExecutionEvent, RunState};
use crate::engine::sink::EventSink;

/// Keeps every lifecycle event of a run in memory, for assertions.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Vec<ExecutionEvent>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Event-state transitions in emission order, as `(index, state)`.
    pub fn event_transitions(&self) -> Vec<(usize, EventState)> {
        self.events
            .iter()
            .filter_map(|e| e.kind.event_state())
            .collect()
    }

    /// Run-state transitions in emission order.
    pub fn run_transitions(&self) -> Vec<RunState> {
        self.events.iter().filter_map(|e| e.kind.run_state()).collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&mut self, event: ExecutionEvent) {
        self.events.push(event);
    }
}
