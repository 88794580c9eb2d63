//! Preview build pipeline.
//!
//! One build, synchronous and from scratch:
//! registry → entry rewrite/transpile → dependency mapping → sandbox document.
//! Only an entry failure is an error. Everything else degrades and shows up
//! in the [`BuildReport`].

#[cfg(feature = "napi")]
use napi_derive::napi;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cdn::DependencyCatalog;
use crate::config::EngineConfig;
use crate::error::{CompileError, ConfigError};
use crate::paths::{base_package, is_relative};
use crate::project::ProjectFiles;
use crate::registry::ModuleRegistry;
use crate::rewrite::{is_react_builtin, rewrite_module_syntax, RewriteMode};
use crate::sandbox::{BuildPayload, SandboxExecutor};
use crate::transpile::Transpiler;

/// Everything a build reads. Two equal requests produce the same payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildRequest {
    pub entry_source: String,
    pub stylesheet: Option<String>,
    pub files: ProjectFiles,
    pub dependencies: Vec<String>,
}

impl BuildRequest {
    pub fn new(entry_source: impl Into<String>) -> Self {
        Self {
            entry_source: entry_source.into(),
            ..Self::default()
        }
    }

    pub fn with_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.stylesheet = Some(stylesheet.into());
        self
    }

    pub fn with_files(mut self, files: ProjectFiles) -> Self {
        self.files = files;
        self
    }

    pub fn with_dependencies<S: Into<String>>(mut self, dependencies: impl IntoIterator<Item = S>) -> Self {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// SHA-256 over every watched input.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.entry_source.as_bytes());
        hasher.update([0u8]);
        match &self.stylesheet {
            Some(css) => {
                hasher.update([1u8]);
                hasher.update(css.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update([0u8]);
        for dep in &self.dependencies {
            hasher.update(dep.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.files.fingerprint().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedImport {
    pub importer: String,
    pub specifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Canonical paths of every registered module.
    pub modules: Vec<String>,
    pub stylesheets: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    /// Imports that will load as `{}` at runtime.
    pub unresolved: Vec<UnresolvedImport>,
    pub unknown_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub payload: BuildPayload,
    pub report: BuildReport,
}

#[derive(Debug, Clone)]
pub struct PreviewBuilder {
    config: EngineConfig,
    catalog: DependencyCatalog,
    transpiler: Transpiler,
    bootstrap: Regex,
    sandbox: SandboxExecutor,
}

impl PreviewBuilder {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let bootstrap = config.bootstrap_regex()?;
        Ok(Self {
            catalog: DependencyCatalog::builtin().with_extra(&config.extra_dependencies),
            transpiler: Transpiler::new(config.jsx.clone()),
            sandbox: SandboxExecutor::new(&config),
            bootstrap,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &DependencyCatalog {
        &self.catalog
    }

    pub fn build(&self, request: &BuildRequest) -> Result<BuildOutput, CompileError> {
        let entry_path = self.config.entry_path.as_str();

        let registry = ModuleRegistry::build(
            &request.files,
            entry_path,
            &self.bootstrap,
            &self.transpiler,
        );

        let entry = rewrite_module_syntax(&request.entry_source, entry_path, RewriteMode::Entry)?;
        let entry_js = self.transpiler.transpile(&entry.code, entry_path)?;

        let script_urls = self.catalog.resolve_script_tags(&request.dependencies);
        let globals = self.catalog.globals_table();

        let payload = self.sandbox.build(
            &entry_js,
            request.stylesheet.as_deref(),
            &registry,
            &script_urls,
            &globals,
        );

        let mut unresolved = Vec::new();
        for specifier in &entry.imports {
            self.check_import(&registry, request, entry_path, specifier, &mut unresolved);
        }
        for module in registry.modules() {
            for specifier in &module.imports {
                self.check_import(&registry, request, &module.path, specifier, &mut unresolved);
            }
        }

        let report = BuildReport {
            modules: registry.modules().map(|m| m.path.clone()).collect(),
            stylesheets: registry.stylesheets().map(|s| s.path.clone()).collect(),
            skipped: registry
                .skipped()
                .iter()
                .map(|s| SkippedFile {
                    path: s.path.clone(),
                    error: s.error.to_string(),
                })
                .collect(),
            unresolved,
            unknown_dependencies: self
                .catalog
                .unknown(&request.dependencies)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        tracing::debug!(
            modules = report.modules.len(),
            skipped = report.skipped.len(),
            unresolved = report.unresolved.len(),
            fingerprint = %payload.fingerprint,
            "preview build finished"
        );

        Ok(BuildOutput { payload, report })
    }

    /// Record `specifier` if nothing will answer it at runtime. A catalog
    /// package only answers when it was requested.
    fn check_import(
        &self,
        registry: &ModuleRegistry,
        request: &BuildRequest,
        importer: &str,
        specifier: &str,
        unresolved: &mut Vec<UnresolvedImport>,
    ) {
        if is_react_builtin(specifier) {
            return;
        }
        if registry.resolve(specifier, Some(importer)).is_some() {
            return;
        }
        if !is_relative(specifier) && self.catalog.resolve_global(specifier).is_some() {
            let requested = request.dependencies.iter().any(|dep| {
                dep == specifier || base_package(specifier) == dep.as_str()
            });
            if requested {
                return;
            }
        }
        tracing::warn!(importer = %importer, specifier = %specifier, "import has no module, it will load as an empty object");
        unresolved.push(UnresolvedImport {
            importer: importer.to_string(),
            specifier: specifier.to_string(),
        });
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeBuildInput {
    #[serde(default)]
    config: EngineConfig,
    #[serde(flatten)]
    request: BuildRequest,
}

/// JSON in, JSON out: `{ config?, entrySource, stylesheet?, files, dependencies }`
/// → `BuildOutput`.
pub fn build_preview_json(input: &str) -> Result<String, String> {
    let input: NativeBuildInput = serde_json::from_str(input).map_err(|e| e.to_string())?;
    let builder = PreviewBuilder::new(input.config).map_err(|e| e.to_string())?;
    let output = builder
        .build(&input.request)
        .map_err(|e| e.user_message())?;
    serde_json::to_string(&output).map_err(|e| e.to_string())
}

#[cfg(feature = "napi")]
#[napi]
pub fn build_preview_native(input: String) -> napi::Result<String> {
    build_preview_json(&input).map_err(napi::Error::from_reason)
}
