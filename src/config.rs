//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cdn::DependencyDescriptor;
use crate::error::ConfigError;
use crate::transpile::JsxConfig;

pub const DEFAULT_BOOTSTRAP_PATTERN: &str = r"^index\.(jsx?|tsx?)$";

lazy_static! {
    static ref DEFAULT_BOOTSTRAP_RE: Regex = Regex::new(DEFAULT_BOOTSTRAP_PATTERN).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Quiet period after the last input change before a build starts.
    pub debounce_ms: u64,
    /// How often the detached preview window asks for fresh code.
    pub poll_interval_ms: u64,
    /// Project path of the mounted entry file.
    pub entry_path: String,
    /// Top-level application bootstrap, never registered as a module.
    pub bootstrap_pattern: String,
    pub react_url: String,
    pub react_dom_url: String,
    pub jsx: JsxConfig,
    pub extra_dependencies: Vec<DependencyDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            poll_interval_ms: 300,
            entry_path: "App.jsx".to_string(),
            bootstrap_pattern: DEFAULT_BOOTSTRAP_PATTERN.to_string(),
            react_url: "https://unpkg.com/react@18/umd/react.development.js".to_string(),
            react_dom_url: "https://unpkg.com/react-dom@18/umd/react-dom.development.js"
                .to_string(),
            jsx: JsxConfig::default(),
            extra_dependencies: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.bootstrap_regex()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn bootstrap_regex(&self) -> Result<Regex, ConfigError> {
        if self.bootstrap_pattern == DEFAULT_BOOTSTRAP_PATTERN {
            return Ok(DEFAULT_BOOTSTRAP_RE.clone());
        }
        Regex::new(&self.bootstrap_pattern).map_err(|source| ConfigError::Pattern {
            pattern: self.bootstrap_pattern.clone(),
            source,
        })
    }
}
