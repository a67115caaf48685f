use serde::Serialize;
use std::fmt;

pub mod action;
pub mod events;
pub mod execute;
pub mod mode;
pub mod recorder;
pub mod run;
pub mod sink;
pub mod state;
pub mod summary;
pub mod time;
pub mod validate;
pub mod wait;

#[cfg(test)]
pub mod testing;

pub use mode::{FailurePolicy, TimingMode, WriteMode};

use action::ActionOutput;
use events::EventState;
use time::Timestamp;

/* ---------------- execution output ---------------- */

/// What happened to one event. Only built once the action has finished,
/// successfully or not.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub index: usize,
    pub action: String,
    pub message: String,
    pub scheduled_at: Timestamp,
    pub fired_at: Timestamp,
    pub state: EventState,
    pub outcome: ActionOutput,
}

impl ExecutionRecord {
    pub fn failed(&self) -> bool {
        self.state == EventState::Failed
    }
}

/* ---------------- validation ---------------- */

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationError {
    pub code: &'static str,

    /// 1-based event index, when the problem is inside an event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub message: String,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn error(
        code: &'static str,
        event: Option<usize>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let mut report = Self::ok();
        report.push(code, event, field, message);
        report
    }

    pub fn push(
        &mut self,
        code: &'static str,
        event: Option<usize>,
        field: Option<&str>,
        message: impl Into<String>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            code,
            event,
            field: field.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.code)?;
        if let Some(index) = self.event {
            write!(f, " event {}", index)?;
        }
        if let Some(field) = &self.field {
            write!(f, " `{}`", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}
