use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::CompileError;

pub const CONFIG_FILE: &str = "specweave.toml";

/// Which check categories are woven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    pub preconditions: bool,
    pub postconditions: bool,
    pub invariants: bool,
    pub exceptional: bool,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self { preconditions: true, postconditions: true, invariants: true, exceptional: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Calls deeper than this abort the run.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_call_depth: 512 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub checks: ChecksConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    pub fn from_toml(content: &str, path: &Path) -> Result<Config, CompileError> {
        let config: Config = toml::from_str(content).map_err(|e| {
            CompileError::config(format!("{CONFIG_FILE}: invalid syntax: {e}"), path.to_path_buf())
        })?;
        if config.runtime.max_call_depth == 0 {
            return Err(CompileError::config(
                format!("{CONFIG_FILE}: max_call_depth must be at least 1"),
                path.to_path_buf(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config, CompileError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompileError::config(format!("{CONFIG_FILE}: could not read file: {e}"), path.to_path_buf())
        })?;
        Self::from_toml(&content, path)
    }

    /// An explicit path must exist. Otherwise `specweave.toml` next to the
    /// source is used when present, and defaults when not.
    pub fn discover(explicit: Option<&Path>, source: &Path) -> Result<Config, CompileError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_location(source) {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "using config file");
                Self::load(&path)
            }
            _ => Ok(Config::default()),
        }
    }
}

fn default_location(source: &Path) -> Option<PathBuf> {
    let dir = source.parent()?;
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    Some(dir.join(CONFIG_FILE))
}
