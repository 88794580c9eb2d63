//! Module Registry Builder
//!
//! Every non-entry file of the project becomes either a stylesheet entry or a
//! module factory. Both are reachable under all path variants of their file;
//! a factory is executed and cached under its canonical (project) path.
//!
//! ## Invariants
//!
//! 1. A file that fails to rewrite or transpile is skipped; the rest of the
//!    build proceeds.
//! 2. When two scripts share an alias (`a.js` and `a.jsx` both answer to `a`)
//!    the alias belongs to the higher-priority extension:
//!    `.tsx > .ts > .jsx > .js`. The outcome does not depend on file order.
//! 3. Nothing survives the build: the registry is rebuilt from scratch.

use regex::Regex;
use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::paths::{candidate_paths, classify, extension_rank, path_variants, strip_script_extension, FileKind};
use crate::project::ProjectFiles;
use crate::rewrite::{rewrite_module_syntax, RewriteMode};
use crate::transpile::Transpiler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModule {
    /// Canonical project path, also the cache key at runtime.
    pub path: String,
    pub variants: Vec<String>,
    /// Transpiled body, not yet wrapped.
    pub code: String,
    pub imports: Vec<String>,
    pub named_exports: Vec<String>,
    pub default_export: Option<String>,
}

impl RegisteredModule {
    /// The body wrapped as a deferred factory.
    pub fn factory_source(&self) -> String {
        format!("function (module, exports, require) {{\n{}\n}}", self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredStylesheet {
    pub path: String,
    pub variants: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModule {
    pub path: String,
    pub error: CompileError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<'a> {
    Module(&'a RegisteredModule),
    Stylesheet(&'a RegisteredStylesheet),
}

#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, RegisteredModule>,
    stylesheets: BTreeMap<String, RegisteredStylesheet>,
    module_aliases: BTreeMap<String, String>,
    stylesheet_aliases: BTreeMap<String, String>,
    skipped: Vec<SkippedModule>,
}

/// Whether `path` is the entry file (or a sibling sharing its stem).
fn is_entry(path: &str, entry_path: &str) -> bool {
    if path == entry_path {
        return true;
    }
    matches!(classify(path), FileKind::Script(_))
        && matches!(classify(entry_path), FileKind::Script(_))
        && strip_script_extension(path) == strip_script_extension(entry_path)
}

impl ModuleRegistry {
    pub fn build(
        files: &ProjectFiles,
        entry_path: &str,
        bootstrap: &Regex,
        transpiler: &Transpiler,
    ) -> Self {
        let mut registry = Self::default();

        for (path, content) in files.iter() {
            if is_entry(path, entry_path) || bootstrap.is_match(path) {
                continue;
            }

            match classify(path) {
                FileKind::Stylesheet => registry.register_stylesheet(path, content),
                FileKind::Script(_) => match compile_module(path, content, transpiler) {
                    Ok(module) => registry.register_module(module),
                    Err(error) => {
                        tracing::warn!(path = %path, error = %error, "module failed to compile, skipping");
                        registry.skipped.push(SkippedModule {
                            path: path.to_string(),
                            error,
                        });
                    }
                },
                FileKind::Other => {}
            }
        }

        tracing::debug!(
            modules = registry.modules.len(),
            stylesheets = registry.stylesheets.len(),
            skipped = registry.skipped.len(),
            "module registry built"
        );
        registry
    }

    fn register_stylesheet(&mut self, path: &str, text: &str) {
        let variants = path_variants(path);
        for variant in &variants {
            self.stylesheet_aliases
                .entry(variant.clone())
                .or_insert_with(|| path.to_string());
        }
        self.stylesheets.insert(
            path.to_string(),
            RegisteredStylesheet {
                path: path.to_string(),
                variants,
                text: text.to_string(),
            },
        );
    }

    fn register_module(&mut self, module: RegisteredModule) {
        for variant in &module.variants {
            let claim = match self.module_aliases.get(variant) {
                Some(owner) => extension_rank(&module.path) < extension_rank(owner),
                None => true,
            };
            if claim {
                self.module_aliases
                    .insert(variant.clone(), module.path.clone());
            }
        }
        self.modules.insert(module.path.clone(), module);
    }

    pub fn modules(&self) -> impl Iterator<Item = &RegisteredModule> {
        self.modules.values()
    }

    pub fn module(&self, path: &str) -> Option<&RegisteredModule> {
        self.modules.get(path)
    }

    pub fn stylesheets(&self) -> impl Iterator<Item = &RegisteredStylesheet> {
        self.stylesheets.values()
    }

    pub fn skipped(&self) -> &[SkippedModule] {
        &self.skipped
    }

    /// variant → canonical module path.
    pub fn module_aliases(&self) -> &BTreeMap<String, String> {
        &self.module_aliases
    }

    /// variant → canonical stylesheet path.
    pub fn stylesheet_aliases(&self) -> &BTreeMap<String, String> {
        &self.stylesheet_aliases
    }

    /// variant → wrapped factory source.
    pub fn factories_by_path_variant(&self) -> BTreeMap<String, String> {
        self.module_aliases
            .iter()
            .filter_map(|(variant, path)| {
                self.modules
                    .get(path)
                    .map(|m| (variant.clone(), m.factory_source()))
            })
            .collect()
    }

    /// variant → stylesheet text.
    pub fn stylesheets_by_path_variant(&self) -> BTreeMap<String, String> {
        self.stylesheet_aliases
            .iter()
            .filter_map(|(variant, path)| {
                self.stylesheets
                    .get(path)
                    .map(|s| (variant.clone(), s.text.clone()))
            })
            .collect()
    }

    /// Resolve a specifier the way the sandbox loader does: stylesheets over
    /// every candidate first, then factories.
    pub fn resolve(&self, specifier: &str, importer: Option<&str>) -> Option<Resolved<'_>> {
        let candidates = candidate_paths(specifier, importer);
        for candidate in &candidates {
            if let Some(path) = self.stylesheet_aliases.get(candidate) {
                if let Some(sheet) = self.stylesheets.get(path) {
                    return Some(Resolved::Stylesheet(sheet));
                }
            }
        }
        for candidate in &candidates {
            if let Some(path) = self.module_aliases.get(candidate) {
                if let Some(module) = self.modules.get(path) {
                    return Some(Resolved::Module(module));
                }
            }
        }
        None
    }
}

fn compile_module(
    path: &str,
    content: &str,
    transpiler: &Transpiler,
) -> Result<RegisteredModule, CompileError> {
    let rewritten = rewrite_module_syntax(content, path, RewriteMode::Module)?;
    let code = transpiler.transpile(&rewritten.code, path)?;
    Ok(RegisteredModule {
        path: path.to_string(),
        variants: path_variants(path),
        code,
        imports: rewritten.imports,
        named_exports: rewritten.named_exports,
        default_export: rewritten.default_export,
    })
}
