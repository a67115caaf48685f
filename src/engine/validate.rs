use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::time::{TimeBasis, Timestamp};
use crate::engine::ValidationReport;
use crate::error::EngineError;
use crate::scenario::{Event, EventAction, Scenario, Trigger};

/// Fields copied verbatim into the run-log record.
const PASSTHROUGH_FIELDS: &[&str] = &["kind", "size", "description"];

/// Validate a scenario document and build the in-memory model.
///
/// Nothing is executed or written here; the caller only proceeds when this
/// returns `Ok`.
pub fn parse_scenario(raw: &str, source: &Path) -> Result<Scenario, EngineError> {
    let doc: YamlValue = serde_yaml::from_str(raw).map_err(|e| {
        EngineError::Validation(ValidationReport::error(
            "SCENARIO_INVALID_YAML",
            None,
            None,
            format!("Scenario is not valid YAML: {}", e),
        ))
    })?;

    let root = doc.as_mapping().ok_or_else(|| {
        EngineError::Validation(ValidationReport::error(
            "SCENARIO_INVALID_YAML",
            None,
            None,
            "Scenario root must be a mapping",
        ))
    })?;

    let mut report = ValidationReport::ok();

    let id = required_text(root, "id", &mut report);
    let name = required_text(root, "name", &mut report);
    let expected_label = required_text(root, "expected_label", &mut report);
    let start_at = validate_start_at(root, &mut report);
    let events = validate_events(root, &mut report);
    let basis = validate_basis(start_at, &events, &mut report);

    match (id, name, expected_label) {
        (Some(id), Some(name), Some(expected_label)) if report.is_valid() => Ok(Scenario {
            id,
            name,
            expected_label,
            start_at,
            basis,
            metadata: passthrough_metadata(root),
            events,
            source: source.to_path_buf(),
        }),
        _ => Err(EngineError::Validation(report)),
    }
}

/// Wrap a read failure in the same report shape as every other problem.
pub fn read_failure(path: &Path, err: &anyhow::Error) -> EngineError {
    EngineError::Validation(ValidationReport::error(
        "SCENARIO_READ_FAILED",
        None,
        None,
        format!("Failed to read scenario {}: {:#}", path.display(), err),
    ))
}

/* ---------------- header ---------------- */

fn required_text(root: &Mapping, key: &str, report: &mut ValidationReport) -> Option<String> {
    match root.get(key) {
        None | Some(YamlValue::Null) => {
            report.push("FIELD_MISSING", None, Some(key), format!("`{}` is required", key));
            None
        }
        Some(value) => match scalar_text(value) {
            Some(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Some(_) => {
                report.push("FIELD_MISSING", None, Some(key), format!("`{}` is blank", key));
                None
            }
            None => {
                report.push(
                    "FIELD_INVALID",
                    None,
                    Some(key),
                    format!("`{}` must be a scalar value", key),
                );
                None
            }
        },
    }
}

fn validate_start_at(root: &Mapping, report: &mut ValidationReport) -> Option<Timestamp> {
    let value = match root.get("start_at") {
        None | Some(YamlValue::Null) => return None,
        Some(v) => v,
    };

    let parsed = value.as_str().and_then(Timestamp::parse);
    if parsed.is_none() {
        report.push(
            "TIMESTAMP_INVALID",
            None,
            Some("start_at"),
            format!("Cannot parse `start_at` timestamp: {}", describe(value)),
        );
    }
    parsed
}

fn passthrough_metadata(root: &Mapping) -> BTreeMap<String, serde_json::Value> {
    PASSTHROUGH_FIELDS
        .iter()
        .filter_map(|key| {
            let value = root.get(*key).filter(|v| !v.is_null())?;
            let json = serde_json::to_value(value).ok()?;
            Some((key.to_string(), json))
        })
        .collect()
}

/* ---------------- events ---------------- */

fn validate_events(root: &Mapping, report: &mut ValidationReport) -> Vec<Event> {
    let items = match root.get("events") {
        Some(YamlValue::Sequence(items)) => items,
        Some(_) => {
            report.push("EVENTS_MISSING", None, Some("events"), "`events` must be a list");
            return Vec::new();
        }
        None => {
            report.push("EVENTS_MISSING", None, Some("events"), "`events` is required");
            return Vec::new();
        }
    };

    if items.is_empty() {
        report.push(
            "EVENTS_EMPTY",
            None,
            Some("events"),
            "At least one event must be provided",
        );
        return Vec::new();
    }

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| validate_event(i + 1, item, report))
        .collect()
}

fn validate_event(index: usize, item: &YamlValue, report: &mut ValidationReport) -> Option<Event> {
    let map = match item.as_mapping() {
        Some(m) => m,
        None => {
            report.push("EVENT_INVALID", Some(index), None, "Event must be a mapping");
            return None;
        }
    };

    let trigger = validate_trigger(index, map, report);
    let action = validate_action(index, map, report);
    let message = map
        .get("message")
        .and_then(scalar_text)
        .map(|m| m.trim().to_string())
        .unwrap_or_default();

    Some(Event {
        index,
        trigger: trigger?,
        action: action?,
        message,
    })
}

fn validate_trigger(index: usize, map: &Mapping, report: &mut ValidationReport) -> Option<Trigger> {
    match (map.get("after_seconds"), map.get("at")) {
        (Some(_), Some(_)) => {
            report.push(
                "TRIGGER_CONFLICT",
                Some(index),
                Some("after_seconds"),
                "Specify exactly one of `after_seconds` or `at`, not both",
            );
            None
        }
        (None, None) => {
            report.push(
                "TRIGGER_MISSING",
                Some(index),
                Some("after_seconds"),
                "Specify `after_seconds` or `at`",
            );
            None
        }
        (Some(value), None) => match seconds_value(value) {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Trigger::AfterSeconds(secs)),
            _ => {
                report.push(
                    "AFTER_SECONDS_INVALID",
                    Some(index),
                    Some("after_seconds"),
                    format!(
                        "`after_seconds` must be a non-negative number, got {}",
                        describe(value)
                    ),
                );
                None
            }
        },
        (None, Some(value)) => match value.as_str().and_then(Timestamp::parse) {
            Some(at) => Some(Trigger::At(at)),
            None => {
                report.push(
                    "TIMESTAMP_INVALID",
                    Some(index),
                    Some("at"),
                    format!("Cannot parse `at` timestamp: {}", describe(value)),
                );
                None
            }
        },
    }
}

fn validate_action(
    index: usize,
    map: &Mapping,
    report: &mut ValidationReport,
) -> Option<EventAction> {
    let command = match (map.get("action"), map.get("cmd")) {
        (Some(_), Some(_)) => {
            report.push(
                "ACTION_CONFLICT",
                Some(index),
                Some("action"),
                "`action` and `cmd` are aliases; give only one",
            );
            return None;
        }
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    let reset_value = match (map.get("reset_state"), map.get("reset_queue")) {
        (Some(_), Some(_)) => {
            report.push(
                "ACTION_CONFLICT",
                Some(index),
                Some("reset_state"),
                "`reset_state` and `reset_queue` are aliases; give only one",
            );
            return None;
        }
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    let reset = match reset_value {
        None => None,
        Some(value) => match parse_reset(value) {
            Ok(reset) => reset,
            Err(message) => {
                report.push("RESET_INVALID", Some(index), Some("reset_state"), message);
                return None;
            }
        },
    };

    match (command, reset) {
        (Some(_), Some(_)) => {
            report.push(
                "ACTION_CONFLICT",
                Some(index),
                Some("action"),
                "An event runs either a command or a state reset, not both",
            );
            None
        }
        (None, None) => {
            report.push(
                "ACTION_MISSING",
                Some(index),
                Some("action"),
                "Event needs an `action` (or `cmd`) or `reset_state`",
            );
            None
        }
        (None, Some(reset)) => Some(reset),
        (Some(value), None) => match scalar_text(value).map(|s| s.trim().to_string()) {
            Some(cmd) if !cmd.is_empty() => Some(EventAction::Command(cmd)),
            _ => {
                report.push(
                    "ACTION_EMPTY",
                    Some(index),
                    Some("action"),
                    "`action` must be a non-empty command string",
                );
                None
            }
        },
    }
}

fn parse_reset(value: &YamlValue) -> Result<Option<EventAction>, String> {
    match value {
        YamlValue::Bool(false) => Ok(None),
        YamlValue::Bool(true) => Ok(Some(EventAction::ResetState { template: None })),
        YamlValue::Mapping(m) => {
            let template = match m.get("template") {
                None | Some(YamlValue::Null) => None,
                Some(YamlValue::String(s)) if !s.trim().is_empty() => Some(PathBuf::from(s.trim())),
                Some(other) => {
                    return Err(format!(
                        "`reset_state.template` must be a path, got {}",
                        describe(other)
                    ))
                }
            };
            Ok(Some(EventAction::ResetState { template }))
        }
        other => Err(format!(
            "`reset_state` must be true/false or a mapping with `template`, got {}",
            describe(other)
        )),
    }
}

/* ---------------- timestamps ---------------- */

/// All explicit timestamps must agree on naive vs offset-aware.
fn validate_basis(
    start_at: Option<Timestamp>,
    events: &[Event],
    report: &mut ValidationReport,
) -> Option<TimeBasis> {
    let mut declared: Option<(TimeBasis, String)> =
        start_at.map(|t| (t.basis(), "`start_at`".to_string()));

    for event in events {
        let at = match &event.trigger {
            Trigger::At(at) => at,
            Trigger::AfterSeconds(_) => continue,
        };

        if let Some((basis, origin)) = &declared {
            if *basis != at.basis() {
                report.push(
                    "TIMESTAMP_BASIS_MISMATCH",
                    Some(event.index),
                    Some("at"),
                    format!("`at` is {} but {} is {}", at.basis(), origin, basis),
                );
            }
        } else {
            declared = Some((at.basis(), format!("event {}", event.index)));
        }
    }

    declared.map(|(basis, _)| basis)
}

/* ---------------- helpers ---------------- */

fn scalar_text(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn seconds_value(value: &YamlValue) -> Option<f64> {
    match value {
        YamlValue::Number(n) => n.as_f64(),
        YamlValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn describe(value: &YamlValue) -> String {
    match value {
        YamlValue::Null => "null".to_string(),
        YamlValue::Sequence(_) => "a list".to_string(),
        YamlValue::Mapping(_) => "a mapping".to_string(),
        other => scalar_text(other)
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "an unsupported value".to_string()),
    }
}
