// promptmap/src/config.rs
//! Optional `promptmap.toml`. Every section and key may be omitted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{analyze::AnalyzeOptions, error::ConfigError, render::LineOrder};

/// File looked up next to the input when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "promptmap.toml";

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# promptmap configuration

[analysis]
# Also list restricted (pub(super), pub(in ..)) and private members
include_private = false
# List receiver-less fns returning Self as `Ctor` lines
include_ctors = false

[render]
# "arrival" keeps the order records arrived in; "stable" sorts by member name
line_order = "arrival"

[scan]
# Directory names never descended into
exclude_dirs = ["target", ".git", "node_modules"]

[run]
# Worker threads; 0 lets rayon decide
jobs = 0
"#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalyzeOptions,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub line_order: LineOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub jobs: usize,
}

fn default_exclude_dirs() -> Vec<String> {
    vec!["target".to_string(), ".git".to_string(), "node_modules".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { exclude_dirs: default_exclude_dirs() }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// `dir/promptmap.toml` if present, defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert!(!config.analysis.include_private);
        assert!(!config.analysis.include_ctors);
        assert_eq!(config.render.line_order, LineOrder::Arrival);
        assert_eq!(config.scan.exclude_dirs, default_exclude_dirs());
        assert_eq!(config.run.jobs, 0);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let config = Config::from_toml("[analysis]\ninclude_ctors = true\n").unwrap();
        assert!(config.analysis.include_ctors);
        assert!(!config.analysis.include_private);
        assert_eq!(config.scan.exclude_dirs, default_exclude_dirs());

        let config = Config::from_toml("[render]\nline_order = \"stable\"\n").unwrap();
        assert_eq!(config.render.line_order, LineOrder::Stable);
    }

    #[test]
    fn bad_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[render]\nline_order = \"sideways\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("nope.toml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.run.jobs, 0);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[run]\njobs = 3\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().run.jobs, 3);
    }
}
