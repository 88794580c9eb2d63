//! Transpiler Adapter
//!
//! Turns one rewritten file into browser-executable JavaScript with the oxc
//! transformer: JSX is lowered with the classic runtime (`React.createElement`
//! against the preloaded global) and TypeScript syntax is erased. The input
//! has already lost its module declarations, so it is parsed with the script
//! goal and emitted as plain script code.

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions, Transformer};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CompileError;
use crate::paths::{classify, FileKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsxConfig {
    pub pragma: String,
    pub pragma_frag: String,
}

impl Default for JsxConfig {
    fn default() -> Self {
        Self {
            pragma: "React.createElement".to_string(),
            pragma_frag: "React.Fragment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    jsx: JsxConfig,
}

/// Source type for already-rewritten code (script goal).
pub fn script_source_type(path: &str) -> SourceType {
    let source_type = SourceType::default().with_module(false);
    match classify(path) {
        FileKind::Script("ts") => source_type.with_typescript(true),
        FileKind::Script("tsx") => source_type.with_typescript(true).with_jsx(true),
        _ => source_type.with_jsx(true),
    }
}

impl Transpiler {
    pub fn new(jsx: JsxConfig) -> Self {
        Self { jsx }
    }

    fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            jsx: JsxOptions {
                runtime: JsxRuntime::Classic,
                pragma: Some(self.jsx.pragma.clone()),
                pragma_frag: Some(self.jsx.pragma_frag.clone()),
                ..JsxOptions::default()
            },
            ..TransformOptions::default()
        }
    }

    pub fn transpile(&self, source: &str, file_path: &str) -> Result<String, CompileError> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, script_source_type(file_path)).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            return Err(CompileError::from_diagnostics(file_path, &parsed.errors));
        }
        let mut program = parsed.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let options = self.transform_options();
        let transformed = Transformer::new(&allocator, Path::new(file_path), &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(CompileError::from_diagnostics(file_path, &transformed.errors));
        }

        Ok(Codegen::new().build(&program).code)
    }
}
