// src/engine/recorder.rs

//! The two durable outputs of a run.
//!
//! - Run log: JSON Lines, one [`ScenarioRun`] per line, across runs.
//! - Detail log: one human-readable line per execution record, for the
//!   latest run of a scenario only.
//!
//! Every line goes out with a single `write_all` followed by a flush, so an
//! interrupted process leaves whole lines behind.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::engine::events::EventState;
use crate::engine::summary::ScenarioRun;
use crate::engine::{ExecutionRecord, WriteMode};
use crate::error::EngineError;
use crate::util::{ensure_dir, slugify};

/// Destination for execution records as they are produced.
pub trait RecordSink {
    fn persist(&mut self, record: &ExecutionRecord) -> Result<(), EngineError>;
}

/* ---------------- detail log ---------------- */

pub struct DetailLog {
    path: PathBuf,
    file: File,
    lines: Vec<String>,
}

/// `<dir>/<slug(name)>.log`
pub fn detail_log_path(dir: &Path, scenario_name: &str) -> PathBuf {
    dir.join(format!("{}.log", slugify(scenario_name)))
}

impl DetailLog {
    /// Create (or truncate) the detail log for this run.
    pub fn create(dir: &Path, scenario_name: &str) -> Result<Self, EngineError> {
        ensure_dir(dir).map_err(|e| EngineError::Persistence(format!("{:#}", e)))?;

        let path = detail_log_path(dir, scenario_name);
        let file = File::create(&path).map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to create detail log {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            path,
            file,
            lines: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything written so far, newline-joined.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl RecordSink for DetailLog {
    fn persist(&mut self, record: &ExecutionRecord) -> Result<(), EngineError> {
        let line = format_detail_line(record);

        self.file
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| {
                EngineError::Persistence(format!(
                    "Failed to write detail log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        self.lines.push(line);
        Ok(())
    }
}

/// One detail-log line.
///
/// The timestamp is the *scheduled* time, so dry runs against a fixed base
/// time produce identical files.
pub fn format_detail_line(record: &ExecutionRecord) -> String {
    let status = match record.state {
        EventState::Failed => "FAILED",
        _ => "COMPLETED",
    };
    let rc = record
        .outcome
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());

    let mut line = format!(
        "{} #{} {} rc={} {}",
        record.scheduled_at.log_format(),
        record.index,
        status,
        rc,
        single_line(&record.action)
    );

    if !record.message.is_empty() {
        line.push_str(&format!(" message={}", single_line(&record.message)));
    }

    for (label, text) in [
        ("stdout", record.outcome.stdout.as_str()),
        ("stderr", record.outcome.stderr.as_str()),
        ("error", record.outcome.error.as_deref().unwrap_or("")),
    ] {
        let text = text.trim();
        if !text.is_empty() {
            line.push_str(&format!(" {}=\"{}\"", label, quoted(text)));
        }
    }

    line
}

fn single_line(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

fn quoted(text: &str) -> String {
    single_line(&text.replace('\\', "\\\\").replace('"', "\\\""))
}

/* ---------------- run log ---------------- */

pub struct RunLog {
    path: PathBuf,
    mode: WriteMode,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the file ready for this run: truncate in recreate mode, make sure
    /// it exists and ends on a line boundary in append mode.
    pub fn prepare(&self) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent).map_err(|e| EngineError::Persistence(format!("{:#}", e)))?;
            }
        }

        let result = match self.mode {
            WriteMode::Recreate => File::create(&self.path).map(|_| ()),
            WriteMode::Append => self.open_append().and_then(terminate_last_line),
        };

        result.map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to prepare run log {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Add one summary line.
    pub fn append(&self, run: &ScenarioRun) -> Result<(), EngineError> {
        let json = serde_json::to_string(run).map_err(|e| {
            EngineError::Persistence(format!("Failed to serialise run summary: {}", e))
        })?;

        let mut file = self.open_append().map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to open run log {}: {}",
                self.path.display(),
                e
            ))
        })?;

        file.write_all(format!("{}\n", json).as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| {
                EngineError::Persistence(format!(
                    "Failed to write run log {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }

    fn open_append(&self) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
    }
}

/// Add a `\n` if the file has content but no trailing newline, so the next
/// record starts on its own line.
fn terminate_last_line(mut file: File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
        file.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{record, sample_run};

    fn line_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn append_mode_grows_by_one_line_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/agent_runs.jsonl");

        for expected in 1..=3 {
            let log = RunLog::new(&path, WriteMode::Append);
            log.prepare().unwrap();
            log.append(&sample_run()).unwrap();
            assert_eq!(line_count(&path), expected);
        }
    }

    #[test]
    fn append_mode_starts_a_new_line_after_unterminated_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_runs.jsonl");
        std::fs::write(&path, "{\"earlier\":1}").unwrap();

        let log = RunLog::new(&path, WriteMode::Append);
        log.prepare().unwrap();
        log.append(&sample_run()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "{\"earlier\":1}");
        for line in lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn recreate_mode_always_leaves_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_runs.jsonl");
        std::fs::write(&path, "{\"old\":1}\n{\"old\":2}\n").unwrap();

        for _ in 0..2 {
            let log = RunLog::new(&path, WriteMode::Recreate);
            log.prepare().unwrap();
            log.append(&sample_run()).unwrap();
            assert_eq!(line_count(&path), 1);
        }
    }

    #[test]
    fn run_log_lines_are_json_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let log = RunLog::new(&path, WriteMode::Recreate);
        log.prepare().unwrap();
        log.append(&sample_run()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(value["case_id"], "case-1");
        assert_eq!(value["status"], "finished");
        assert_eq!(value["kind"], "normal");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn detail_log_is_truncated_and_written_per_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("normal-flow.log"), "stale\nstale\n").unwrap();

        let mut log = DetailLog::create(dir.path(), "Normal Flow").unwrap();
        assert_eq!(log.path(), dir.path().join("normal-flow.log"));
        assert_eq!(line_count(log.path()), 0);

        log.persist(&record(1, "echo A", true)).unwrap();
        assert_eq!(line_count(log.path()), 1);
        log.persist(&record(2, "echo B", false)).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text, format!("{}\n", log.text()));
        assert_eq!(log.text().lines().count(), 2);
    }

    #[test]
    fn detail_line_layout() {
        let mut rec = record(3, "python control_queue.py add", false);
        rec.message = "customer\narrives".to_string();
        rec.outcome.stdout = "line one\nline \"two\"\n".to_string();

        assert_eq!(
            format_detail_line(&rec),
            "2025-01-01 10:00:00 #3 FAILED rc=1 cmd=python control_queue.py add \
             message=customer\\narrives stdout=\"line one\\nline \\\"two\\\"\""
        );
    }

    #[test]
    fn unwritable_detail_dir_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = DetailLog::create(&blocker, "x").err().unwrap();
        assert!(matches!(err, EngineError::Persistence(_)));
    }
}
