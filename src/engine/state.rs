// src/engine/state.rs

//! Shared state reset.
//!
//! The target application reads one shared document (the queue file). The
//! engine never reads or edits it; it can only replace it wholesale with a
//! template snapshot so every run starts from the same state.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::EngineError;

/// Capability owned by whoever owns the shared state document.
pub trait StateStore {
    /// Overwrite the shared document with the template's content.
    ///
    /// Either fully succeeds or leaves the document as it was.
    fn reset(&mut self, template: &Path) -> Result<(), EngineError>;
}

/// State store backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    target: PathBuf,
}

impl FileStateStore {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl StateStore for FileStateStore {
    fn reset(&mut self, template: &Path) -> Result<(), EngineError> {
        let bytes = std::fs::read(template).map_err(|e| {
            EngineError::StateReset(format!(
                "Failed to read state template {}: {}",
                template.display(),
                e
            ))
        })?;

        let dir = match self.target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            EngineError::StateReset(format!(
                "Failed to create state directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        // Stage next to the target so the final rename stays on one filesystem.
        let mut staged = NamedTempFile::new_in(&dir).map_err(|e| {
            EngineError::StateReset(format!("Failed to stage state file: {}", e))
        })?;
        staged
            .write_all(&bytes)
            .and_then(|_| staged.flush())
            .map_err(|e| EngineError::StateReset(format!("Failed to stage state file: {}", e)))?;

        staged.persist(&self.target).map_err(|e| {
            EngineError::StateReset(format!(
                "Failed to replace {}: {}",
                self.target.display(),
                e.error
            ))
        })?;

        tracing::debug!(
            state_path = %self.target.display(),
            template = %template.display(),
            bytes = bytes.len(),
            "state document replaced"
        );
        Ok(())
    }
}
