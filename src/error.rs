//! Error types for the preview engine.
//!
//! Only conditions that abort a build (or a configuration load) are errors.
//! Skipped modules, unresolved imports and unknown CDN packages are reported
//! through `tracing` and the build report instead.

use thiserror::Error;

/// A file failed to parse, rewrite or transpile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}: {}", .diagnostics.join("; "))]
pub struct CompileError {
    pub file: String,
    pub diagnostics: Vec<String>,
}

impl CompileError {
    pub fn new(file: impl Into<String>, diagnostics: Vec<String>) -> Self {
        let mut diagnostics = diagnostics;
        if diagnostics.is_empty() {
            diagnostics.push("unknown compilation failure".to_string());
        }
        Self {
            file: file.into(),
            diagnostics,
        }
    }

    /// Collect diagnostics from anything displayable (oxc diagnostics).
    pub fn from_diagnostics<D: std::fmt::Display>(file: &str, errors: &[D]) -> Self {
        Self::new(file, errors.iter().map(|e| e.to_string()).collect())
    }

    /// Text shown to the user when the entry file fails.
    pub fn user_message(&self) -> String {
        format!("Compilation Error: {}", self)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid bootstrap pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project root not found: {0}")]
    RootNotFound(String),

    #[error("Failed to walk project: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a preview surface while loading a payload.
#[derive(Debug, Clone, Error)]
#[error("Execution Error: {0}")]
pub struct SurfaceError(pub String);

/// The engine task is gone; no further input is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("preview engine has shut down")]
pub struct EngineClosed;
