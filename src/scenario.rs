// src/scenario.rs

//! Scenario model.
//!
//! A scenario is one YAML timeline:
//!
//! ```yaml
//! id: normal-001
//! name: normal flow
//! expected_label: PASS
//! start_at: "2025-01-01T10:00:00"   # optional
//! events:
//!   - after_seconds: 0
//!     action: python control_queue.py add --id A001
//!     message: first customer arrives
//!   - at: "2025-01-01T10:00:15"
//!     reset_state: true
//! ```
//!
//! Event order in the file is execution order. Nothing here sorts by time.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::time::{TimeBasis, Timestamp};
use crate::engine::validate::{parse_scenario, read_failure};
use crate::error::EngineError;
use crate::util::read_to_string;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub name: String,

    /// Verdict tag for the downstream judge. Never interpreted here.
    pub expected_label: String,

    pub start_at: Option<Timestamp>,

    /// Basis shared by every explicit timestamp in the document, if any.
    pub basis: Option<TimeBasis>,

    /// Pass-through fields (`kind`, `size`, `description`).
    pub metadata: BTreeMap<String, JsonValue>,

    pub events: Vec<Event>,

    /// File the scenario was loaded from.
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// 1-based position in the document.
    pub index: usize,
    pub trigger: Trigger,
    pub action: EventAction,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Seconds after the resolved base time.
    AfterSeconds(f64),
    At(Timestamp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    /// Shell command handed to the action runner.
    Command(String),

    /// Overwrite the shared state document with a template.
    /// `None` uses the run's configured template.
    ResetState { template: Option<PathBuf> },
}

impl Scenario {
    /// Read and validate a scenario file.
    ///
    /// Every problem in the document is collected before returning, so a
    /// single failed load reports all of them.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = read_to_string(path).map_err(|e| read_failure(path, &e))?;
        parse_scenario(&raw, path)
    }
}
