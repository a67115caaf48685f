use crate::engine::events::{ExecutionEvent, ExecutionEventKind};
use crate::engine::sink::EventSink;

/// Forwards lifecycle events to `tracing`, one structured line each.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: ExecutionEvent) {
        let run_id = event.run_id.0.as_str();

        match &event.kind {
            ExecutionEventKind::StateReset { template } => {
                tracing::info!(run_id, template = %template.display(), "shared state reset");
            }
            ExecutionEventKind::RunStarted {
                scenario,
                base_time,
                timing,
                events,
            } => {
                tracing::info!(
                    run_id,
                    scenario = %scenario,
                    base_time = %base_time,
                    timing = ?timing,
                    events,
                    "run started"
                );
            }
            ExecutionEventKind::EventWaiting {
                index,
                scheduled_at,
            } => {
                tracing::debug!(run_id, index, scheduled_at = %scheduled_at, "waiting");
            }
            ExecutionEventKind::EventFiring { index, fired_at } => {
                tracing::info!(run_id, index, fired_at = %fired_at, "firing");
            }
            ExecutionEventKind::EventCompleted { index } => {
                tracing::info!(run_id, index, "event completed");
            }
            ExecutionEventKind::EventFailed { index, reason } => {
                tracing::warn!(run_id, index, reason = %reason, "event failed");
            }
            ExecutionEventKind::RunFinished { executed, failed } => {
                tracing::info!(run_id, executed, failed, "run finished");
            }
            ExecutionEventKind::RunAborted { reason } => {
                tracing::error!(run_id, reason = %reason, "run aborted");
            }
        }
    }
}
