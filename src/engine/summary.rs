use crate::engine::events::RunState;
use crate::engine::time::Timestamp;
use crate::engine::ExecutionRecord;
use crate::run_id::RunId;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One line of the run log.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRun {
    pub run_id: RunId,
    pub case_id: String,
    pub scenario_name: String,
    pub scenario_file: String,
    pub expected_label: String,

    /// `kind`, `size`, `description` from the scenario, when present.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, JsonValue>,

    pub status: RunState,
    pub base_time: Timestamp,
    pub run_started: Timestamp,
    pub run_completed: Timestamp,

    /// Events declared in the scenario.
    pub event_count: usize,
    pub executed_count: usize,
    pub failed_count: usize,

    pub log_file: String,
    pub generated_log: String,
    pub records: Vec<ExecutionRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioRun {
    pub fn is_finished(&self) -> bool {
        self.status == RunState::Finished
    }
}
