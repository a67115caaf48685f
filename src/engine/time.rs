// src/engine/time.rs

//! Timestamps, clocks and trigger resolution.
//!
//! Scenario timestamps come in two flavours:
//! - naive (`2025-01-01T10:00:00`), interpreted as local wall-clock time
//! - offset-aware (`2025-01-01T10:00:00+09:00`, `...Z`), normalised to UTC
//!
//! Each flavour is a [`TimeBasis`]. Arithmetic and comparison only happen
//! between timestamps of the same basis; a mismatch is reported, never
//! coerced.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::EngineError;
use crate::scenario::{Event, Scenario, Trigger};

/// Detail-log timestamp layout.
pub const LOG_TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const AWARE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBasis {
    Local,
    Utc,
}

impl fmt::Display for TimeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBasis::Local => f.write_str("local (naive)"),
            TimeBasis::Utc => f.write_str("utc (offset-aware)"),
        }
    }
}

/// A wall-clock instant tagged with its basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    basis: TimeBasis,
    value: NaiveDateTime,
}

impl Timestamp {
    pub fn new(basis: TimeBasis, value: NaiveDateTime) -> Self {
        Self { basis, value }
    }

    /// Parse a scenario or CLI timestamp.
    ///
    /// Offset-aware inputs are converted to UTC; naive inputs are kept as-is
    /// in the local basis. A bare date means midnight.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::new(TimeBasis::Utc, dt.naive_utc()));
        }
        for fmt in AWARE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Some(Self::new(TimeBasis::Utc, dt.naive_utc()));
            }
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(value) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(Self::new(TimeBasis::Local, value));
            }
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|value| Self::new(TimeBasis::Local, value))
    }

    pub fn basis(&self) -> TimeBasis {
        self.basis
    }

    #[allow(dead_code)]
    pub fn value(&self) -> NaiveDateTime {
        self.value
    }

    /// `self + seconds`, at microsecond precision.
    ///
    /// Returns `None` for negative or non-finite offsets and on overflow.
    pub fn checked_add_seconds(&self, seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }

        let micros = (seconds * 1_000_000.0).round();
        if micros >= i64::MAX as f64 {
            return None;
        }

        self.value
            .checked_add_signed(TimeDelta::microseconds(micros as i64))
            .map(|value| Self::new(self.basis, value))
    }

    /// Signed distance from `earlier` to `self`, if both share a basis.
    pub fn since(&self, earlier: &Timestamp) -> Option<TimeDelta> {
        if self.basis != earlier.basis {
            return None;
        }
        Some(self.value.signed_duration_since(earlier.value))
    }

    pub fn log_format(&self) -> String {
        self.value.format(LOG_TIMESTAMP_FMT).to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.basis {
            TimeBasis::Local => write!(f, "{}", self.value.format("%Y-%m-%dT%H:%M:%S%.f")),
            TimeBasis::Utc => f.write_str(
                &self
                    .value
                    .and_utc()
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/* ---------------- clocks ---------------- */

/// Source of "now" in a given basis.
pub trait Clock {
    fn now(&self, basis: TimeBasis) -> Timestamp;
}

/// The machine's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self, basis: TimeBasis) -> Timestamp {
        let value = match basis {
            TimeBasis::Local => chrono::Local::now().naive_local(),
            TimeBasis::Utc => chrono::Utc::now().naive_utc(),
        };
        Timestamp::new(basis, value)
    }
}

/* ---------------- resolution ---------------- */

/// Pick the base time for relative triggers.
///
/// Preference: CLI override, then `start_at`, then the clock, sampled once.
pub fn resolve_base(
    scenario: &Scenario,
    cli_override: Option<&str>,
    clock: &dyn Clock,
) -> Result<Timestamp, EngineError> {
    if let Some(raw) = cli_override {
        let base = Timestamp::parse(raw).ok_or_else(|| {
            EngineError::TimeResolution(format!("Cannot parse base time override {:?}", raw))
        })?;

        if let Some(declared) = scenario.basis {
            if declared != base.basis() {
                return Err(EngineError::TimeResolution(format!(
                    "Base time override {:?} is {} but scenario timestamps are {}",
                    raw,
                    base.basis(),
                    declared
                )));
            }
        }

        return Ok(base);
    }

    if let Some(start_at) = scenario.start_at {
        return Ok(start_at);
    }

    Ok(clock.now(scenario.basis.unwrap_or(TimeBasis::Local)))
}

/// Absolute scheduled time of one event.
pub fn resolve_event_time(event: &Event, base: &Timestamp) -> Result<Timestamp, EngineError> {
    match &event.trigger {
        Trigger::AfterSeconds(seconds) => base.checked_add_seconds(*seconds).ok_or_else(|| {
            EngineError::TimeResolution(format!(
                "Event {}: base time {} + {}s is out of range",
                event.index, base, seconds
            ))
        }),
        Trigger::At(at) => {
            if at.basis() != base.basis() {
                return Err(EngineError::TimeResolution(format!(
                    "Event {}: `at` is {} but base time is {}",
                    event.index,
                    at.basis(),
                    base.basis()
                )));
            }
            Ok(*at)
        }
    }
}
