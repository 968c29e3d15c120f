use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::apod::ApodRecord;

/// What one run leaves behind for the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_old: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apod: Option<ApodRecord>,
}

impl State {
    pub fn load(path: &Path) -> Result<State> {
        if !path.exists() {
            return Ok(State::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read state: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(State::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir: {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write state: {}", path.display()))
    }
}
