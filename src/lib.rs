//! # Rerender Preview Engine
//!
//! Virtual module resolution, transpilation and sandboxed execution for a
//! multi-file React practice project. A build takes uncompiled sources and
//! produces one self-contained document that renders the project's `App`.
//!
//! ## Pipeline
//!
//! 1. **Registry**: every non-entry script is rewritten from ES module
//!    syntax to `require`/`exports`, transpiled, and registered as a factory
//!    under all of its path variants. Stylesheets are registered the same way.
//! 2. **Entry**: the entry file keeps its top-level `App` binding. Imports
//!    become `require` calls, exports are stripped.
//! 3. **Dependencies**: requested packages map to CDN script URLs and the
//!    globals they define.
//! 4. **Sandbox**: the document inlines the loader, the factories and the
//!    entry, and mounts `App` or shows an error block.
//!
//! ## Invariants
//!
//! 1. **Entry failures abort**: only the entry file can fail a build. Any
//!    other file that fails is skipped and the rest of the project renders.
//!
//! 2. **Singleton modules**: a factory runs at most once per build. Every
//!    alias of a file returns the same exports object.
//!
//! 3. **Graceful misses**: an unresolved `require` yields `{}` and never
//!    throws.
//!
//! 4. **No state between builds**: registries and loader tables are built
//!    from scratch every time.
//!
//! 5. **Latest input wins**: the engine debounces changes and only builds the
//!    most recently scheduled input.

pub mod bundle;
pub mod cdn;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod preview_window;
pub mod project;
pub mod registry;
pub mod rewrite;
pub mod sandbox;
pub mod transpile;

#[cfg(test)]
mod bundle_tests;
#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod rewrite_tests;

pub use bundle::{
    build_preview_json, BuildOutput, BuildReport, BuildRequest, PreviewBuilder, SkippedFile,
    UnresolvedImport,
};
#[cfg(feature = "napi")]
pub use bundle::build_preview_native;
pub use cdn::{DependencyCatalog, DependencyDescriptor};
pub use config::EngineConfig;
pub use engine::{EngineController, EnginePhase, EngineStatus, PreviewSurface};
pub use error::{CompileError, ConfigError, EngineClosed, ProjectError, SurfaceError};
pub use preview_window::{detached_window_document, PreviewMessage};
pub use project::{ProjectFile, ProjectFiles};
pub use registry::{ModuleRegistry, RegisteredModule, Resolved};
pub use rewrite::{rewrite_module_syntax, RewriteMode, RewriteOutput};
pub use sandbox::{BuildPayload, SandboxExecutor};
pub use transpile::{JsxConfig, Transpiler};
