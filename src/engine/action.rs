// src/engine/action.rs

//! External command execution.
//!
//! The engine never interprets what a command does to the target system; it
//! records what it asked for and what came back.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command as TokioCommand;

use crate::metrics::{InvocationMetrics, PeakRssSampler, SAMPLE_INTERVAL};

/// Result of one action, successful or not.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ActionOutput {
    pub success: bool,

    /// Process exit code. `None` for non-process actions or signal exits.
    pub exit_code: Option<i32>,

    pub stdout: String,
    pub stderr: String,

    /// Set when the action could not run at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
    pub max_rss_kb: Option<u64>,
}

impl ActionOutput {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Short reason for a failed outcome.
    pub fn failure_reason(&self) -> String {
        match (&self.error, self.exit_code) {
            (Some(e), _) => e.clone(),
            (None, Some(code)) => format!("exit code {}", code),
            (None, None) => "terminated without exit code".to_string(),
        }
    }
}

/// Capability: run one action string and report back.
pub trait ActionRunner {
    async fn run(&self, command: &str) -> ActionOutput;
}

/// Runs actions through a shell (`sh -c <command>` by default).
#[derive(Debug, Clone)]
pub struct ShellActionRunner {
    shell: Vec<String>,
    workdir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl Default for ShellActionRunner {
    fn default() -> Self {
        Self::new(default_shell())
    }
}

pub fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

impl ShellActionRunner {
    pub fn new(shell: Vec<String>) -> Self {
        Self {
            shell,
            workdir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_workdir(mut self, workdir: Option<PathBuf>) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    async fn invoke(&self, command: &str) -> Result<(std::process::Output, InvocationMetrics)> {
        let (program, args) = match self.shell.split_first() {
            Some(split) => split,
            None => bail!("No shell configured to run actions"),
        };

        let mut cmd = TokioCommand::new(program);
        cmd.args(args)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let start = Instant::now();
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", program))?;

        let sampler = child
            .id()
            .map(|pid| PeakRssSampler::spawn(pid, SAMPLE_INTERVAL));

        let output = child
            .wait_with_output()
            .await
            .context("Failed while waiting for action to complete")?;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let max_rss_kb = sampler.and_then(PeakRssSampler::finish);

        Ok((
            output,
            InvocationMetrics {
                duration_ms,
                max_rss_kb,
            },
        ))
    }
}

impl ActionRunner for ShellActionRunner {
    async fn run(&self, command: &str) -> ActionOutput {
        match self.invoke(command).await {
            Ok((output, metrics)) => ActionOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                error: None,
                duration_ms: metrics.duration_ms,
                max_rss_kb: metrics.max_rss_kb,
            },
            Err(e) => ActionOutput::failed(format!("{:#}", e)),
        }
    }
}
