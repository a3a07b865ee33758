use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub config_version: u32,
    /// Patterns dropped from workspace enumeration; see `ExcludeSet`.
    pub exclude_paths: Vec<String>,
    /// Overrides the group store location. `None` means the per-user data
    /// directory.
    pub store_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_version: 1,
            exclude_paths: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
            ],
            store_path: None,
        }
    }
}

impl EngineConfig {
    pub fn load_or_default() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let parsed = toml::from_str::<EngineConfig>(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;

        Ok(parsed)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        ensure_parent_dir(&path)?;

        let body = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write config: {}", path.display()))?;

        Ok(path)
    }

    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => default_store_path(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not resolve config directory")?;
    Ok(base.join("file-groups").join("config.toml"))
}

pub fn default_store_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("could not resolve data directory")?;
    Ok(base.join("file-groups").join("groups.json"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
    }
    Ok(())
}
