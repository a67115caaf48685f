// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::engine::FailurePolicy;
use crate::util::{read_to_string, resolve_relative_to_config};

/// Root of `settings.yaml`.
///
/// The file is optional. Everything in it can be overridden from the CLI,
/// and anything left out falls back to the built-in defaults below.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, alias = "test_scenario_agent")]
    pub scenario_agent: AgentSettings,

    /// Where the settings were read from. `None` when running on defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The `scenario_agent:` section.
///
/// Example in settings.yaml:
///
/// scenario_agent:
///   scenario: ./scenario/normal_flow.yaml
///   output_jsonl: ./log/agent_runs.jsonl
///   dry_run: true
#[derive(Debug, Default, Deserialize)]
pub struct AgentSettings {
    pub scenario: Option<String>,
    pub output_jsonl: Option<String>,
    pub log_dir: Option<String>,

    /// Overrides the scenario's own `start_at`.
    pub base_start: Option<String>,

    pub dry_run: Option<bool>,
    pub append: Option<bool>,
    pub on_failure: Option<FailurePolicy>,

    /// Shell prefix for actions, e.g. `[bash, -lc]`.
    pub shell: Option<Vec<String>>,

    /// Working directory for actions.
    pub workdir: Option<String>,

    /// Extra environment variables for actions.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default, alias = "queue_reset")]
    pub state_reset: StateResetSettings,
}

/// Shared state reset section.
///
/// state_reset:
///   enabled: true
///   state_path: ./queue.json
///   template: ./templates/queue_initial.json
#[derive(Debug, Default, Deserialize)]
pub struct StateResetSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(alias = "queue_path")]
    pub state_path: Option<String>,

    pub template: Option<String>,
}

pub const DEFAULT_SCENARIO: &str = "./scenario/normal_flow.yaml";
pub const DEFAULT_RUN_LOG: &str = "./log/agent_runs.jsonl";
pub const DEFAULT_DETAIL_DIR: &str = "./log/agent_cases";
pub const DEFAULT_STATE_PATH: &str = "./queue.json";
pub const DEFAULT_STATE_TEMPLATE: &str = "./templates/queue_initial.json";

impl Config {
    /// Load and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        // An empty file is a valid "all defaults" file.
        let mut cfg: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse YAML settings {:?}", path))?
        };
        cfg.source = Some(path.to_path_buf());

        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file means built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(settings = %path.display(), "no settings file, using defaults");
            return Ok(Config::default());
        }
        Self::load(path)
    }

    /// Resolve a settings-file path against the settings file's directory.
    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        match &self.source {
            Some(source) => resolve_relative_to_config(source, rel),
            None => Ok(PathBuf::from(rel)),
        }
    }

    fn resolve_or(&self, value: &Option<String>, default: &str) -> Result<PathBuf> {
        self.resolve(value.as_deref().unwrap_or(default))
    }

    pub fn scenario_path(&self) -> Result<PathBuf> {
        self.resolve_or(&self.scenario_agent.scenario, DEFAULT_SCENARIO)
    }

    pub fn run_log_path(&self) -> Result<PathBuf> {
        self.resolve_or(&self.scenario_agent.output_jsonl, DEFAULT_RUN_LOG)
    }

    pub fn detail_dir(&self) -> Result<PathBuf> {
        self.resolve_or(&self.scenario_agent.log_dir, DEFAULT_DETAIL_DIR)
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        self.resolve_or(&self.scenario_agent.state_reset.state_path, DEFAULT_STATE_PATH)
    }

    pub fn state_template(&self) -> Result<PathBuf> {
        self.resolve_or(&self.scenario_agent.state_reset.template, DEFAULT_STATE_TEMPLATE)
    }

    pub fn workdir(&self) -> Result<Option<PathBuf>> {
        self.scenario_agent
            .workdir
            .as_deref()
            .map(|w| self.resolve(w))
            .transpose()
    }
}
