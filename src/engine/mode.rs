use serde::{Deserialize, Serialize};

/// How the executor treats scheduled times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// Wait for each event's scheduled wall-clock time.
    #[default]
    Live,

    /// Collapse every wait to zero.
    DryRun,
}

/// Run-log write policy. Always chosen explicitly, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Truncate the run log at run start.
    #[default]
    Recreate,

    /// Keep earlier lines and add one.
    Append,
}

/// What to do after an action reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next event.
    #[default]
    Continue,

    /// Stop the timeline at the first failed action.
    Abort,
}

impl TimingMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            TimingMode::DryRun
        } else {
            TimingMode::Live
        }
    }
}

impl WriteMode {
    pub fn from_append(append: bool) -> Self {
        if append {
            WriteMode::Append
        } else {
            WriteMode::Recreate
        }
    }
}
