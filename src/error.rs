// src/error.rs

//! Typed errors raised by the execution engine.
//!
//! An action that exits non-zero is *not* an error here: it becomes a failed
//! execution record and the timeline carries on. These variants are the
//! conditions that stop a run (or stop it from starting).

use thiserror::Error;

use crate::engine::ValidationReport;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The scenario document is malformed. Raised before anything runs.
    #[error("Scenario validation failed: {0}")]
    Validation(ValidationReport),

    /// A base time or event time could not be computed.
    #[error("Time resolution error: {0}")]
    TimeResolution(String),

    /// A record could not be written to the run log or the detail log.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The state template could not be copied over the shared state document.
    #[error("State reset error: {0}")]
    StateReset(String),
}

impl EngineError {
    /// Short machine-readable name, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::TimeResolution(_) => "time_resolution",
            EngineError::Persistence(_) => "persistence",
            EngineError::StateReset(_) => "state_reset",
        }
    }
}
