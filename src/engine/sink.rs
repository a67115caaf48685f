use crate::engine::events::ExecutionEvent;

/// Receiver for run and event lifecycle transitions.
pub trait EventSink: Send {
    fn emit(&mut self, event: ExecutionEvent);
}
