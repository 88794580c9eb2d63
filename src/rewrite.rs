//! Syntax Rewriter
//!
//! Converts ES module `import`/`export` statements into the CommonJS form
//! understood by the sandbox loader. The source is parsed with oxc and only
//! the spans of top-level module declarations are spliced; every other byte
//! of the file is kept as written so that the transpiler sees the user's
//! code unchanged.
//!
//! ## Import forms
//!
//! | source                               | output                                        |
//! |--------------------------------------|-----------------------------------------------|
//! | `import D, { a, b as c } from 's'`   | module var, default with interop, destructure |
//! | `import { a, b as c } from 's'`      | `var { a, b: c } = require("s");`             |
//! | `import * as Ns from 's'`            | `var Ns = require("s");`                      |
//! | `import D from 's'`                  | module var, default with interop              |
//! | `import 's'`                         | `require("s");`                               |
//!
//! React specifiers never become a `require`: React and ReactDOM are
//! preloaded globals, so `import * as R from 'react'` becomes `var R = React;`
//! and named imports destructure the global.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_syntax::identifier::is_identifier_name;
use std::collections::HashSet;

use crate::error::CompileError;
use crate::paths::{classify, FileKind};
use crate::sandbox::{BUILTIN_GLOBALS, HOOK_ALIASES};

/// Module specifiers served by the preloaded React globals.
pub const REACT_BUILTINS: [&str; 4] = ["react", "react-dom", "react-dom/client", "react/jsx-runtime"];

pub fn is_react_builtin(specifier: &str) -> bool {
    REACT_BUILTINS.contains(&specifier)
}

/// Global a React specifier reads in the sandbox.
fn builtin_global(specifier: &str) -> Option<&'static str> {
    BUILTIN_GLOBALS
        .iter()
        .find(|(name, _)| *name == specifier)
        .map(|(_, global)| *global)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// The mounted file: exports are stripped, declarations stay global.
    Entry,
    /// Any other script: exports are collected onto `exports`.
    Module,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutput {
    pub code: String,
    /// Requirable specifiers in source order (React builtins excluded).
    pub imports: Vec<String>,
    /// Exported names in the order they are assigned.
    pub named_exports: Vec<String>,
    pub default_export: Option<String>,
}

/// Source type used to parse a file before rewriting (module goal).
pub fn module_source_type(path: &str) -> SourceType {
    let source_type = SourceType::default().with_module(true);
    match classify(path) {
        FileKind::Script("ts") => source_type.with_typescript(true),
        FileKind::Script("tsx") => source_type.with_typescript(true).with_jsx(true),
        _ => source_type.with_jsx(true),
    }
}

pub fn rewrite_module_syntax(
    source: &str,
    file_path: &str,
    mode: RewriteMode,
) -> Result<RewriteOutput, CompileError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, module_source_type(file_path)).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(CompileError::from_diagnostics(file_path, &ret.errors));
    }

    let mut rewriter = ModuleRewriter::new(source, mode);
    rewriter.scan_top_level(&ret.program.body);
    for stmt in &ret.program.body {
        rewriter.rewrite_statement(stmt);
    }

    let mut requires = RequireCollector::default();
    requires.visit_program(&ret.program);

    let mut output = rewriter.finish();
    for specifier in requires.specifiers {
        if !output.imports.contains(&specifier) {
            output.imports.push(specifier);
        }
    }
    Ok(output)
}

/// `require("x")` calls written by hand. They go through the same loader.
#[derive(Default)]
struct RequireCollector {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, expr: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &expr.callee {
            if ident.name == "require" && expr.arguments.len() == 1 {
                if let Argument::StringLiteral(lit) = &expr.arguments[0] {
                    let specifier = lit.value.to_string();
                    if !is_react_builtin(&specifier) {
                        self.specifiers.push(specifier);
                    }
                }
            }
        }
        oxc_ast_visit::walk::walk_call_expression(self, expr);
    }
}

struct ModuleRewriter<'s> {
    source: &'s str,
    mode: RewriteMode,
    replacements: Vec<(u32, u32, String)>,
    imports: Vec<String>,
    /// (exported name, local expression)
    named_exports: Vec<(String, String)>,
    star_exports: Vec<String>,
    default_export: Option<String>,
    top_level: HashSet<String>,
    type_names: HashSet<String>,
    module_vars: usize,
}

impl<'s> ModuleRewriter<'s> {
    fn new(source: &'s str, mode: RewriteMode) -> Self {
        Self {
            source,
            mode,
            replacements: Vec::new(),
            imports: Vec::new(),
            named_exports: Vec::new(),
            star_exports: Vec::new(),
            default_export: None,
            top_level: HashSet::new(),
            type_names: HashSet::new(),
            module_vars: 0,
        }
    }

    fn declares_app(&self) -> bool {
        self.top_level.contains("App")
    }

    fn replace(&mut self, start: u32, end: u32, text: impl Into<String>) {
        self.replacements.push((start, end, text.into()));
    }

    fn remove(&mut self, span: Span) {
        self.replace(span.start, span.end, "");
    }

    fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    /// Offset just past `keyword`, searching from `from`.
    fn keyword_end(&self, from: u32, keyword: &str) -> Option<u32> {
        let rest = self.source.get(from as usize..)?;
        rest.find(keyword)
            .map(|idx| from + (idx + keyword.len()) as u32)
    }

    fn next_module_var(&mut self) -> String {
        self.module_vars += 1;
        format!("__reexport_{}__", self.module_vars)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Top-level bindings
    // ───────────────────────────────────────────────────────────────────────

    fn scan_top_level(&mut self, body: &[Statement]) {
        for stmt in body {
            match stmt {
                Statement::ImportDeclaration(decl) => {
                    if let Some(specifiers) = &decl.specifiers {
                        for specifier in specifiers {
                            let local = match specifier {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                            };
                            self.top_level.insert(local.name.to_string());
                        }
                    }
                }
                Statement::ExportNamedDeclaration(decl) => {
                    if let Some(declaration) = &decl.declaration {
                        self.scan_declaration(declaration);
                    }
                }
                Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        if let Some(id) = &func.id {
                            self.top_level.insert(id.name.to_string());
                        }
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        if let Some(id) = &class.id {
                            self.top_level.insert(id.name.to_string());
                        }
                    }
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(iface) => {
                        self.type_names.insert(iface.id.name.to_string());
                    }
                    _ => {}
                },
                Statement::VariableDeclaration(var) => {
                    for decl in &var.declarations {
                        let mut names = Vec::new();
                        collect_binding_pattern(&decl.id, &mut names);
                        self.top_level.extend(names);
                    }
                }
                Statement::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        self.top_level.insert(id.name.to_string());
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        self.top_level.insert(id.name.to_string());
                    }
                }
                Statement::TSEnumDeclaration(decl) => {
                    self.top_level.insert(decl.id.name.to_string());
                }
                Statement::TSInterfaceDeclaration(iface) => {
                    self.type_names.insert(iface.id.name.to_string());
                }
                Statement::TSTypeAliasDeclaration(alias) => {
                    self.type_names.insert(alias.id.name.to_string());
                }
                _ => {}
            }
        }
    }

    fn scan_declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::TSInterfaceDeclaration(iface) => {
                self.type_names.insert(iface.id.name.to_string());
            }
            Declaration::TSTypeAliasDeclaration(alias) => {
                self.type_names.insert(alias.id.name.to_string());
            }
            other => {
                for name in declared_names(other) {
                    self.top_level.insert(name);
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Statement rewriting
    // ───────────────────────────────────────────────────────────────────────

    fn rewrite_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::ImportDeclaration(decl) => self.rewrite_import(decl),
            Statement::ExportDefaultDeclaration(decl) => self.rewrite_export_default(decl),
            Statement::ExportNamedDeclaration(decl) => self.rewrite_export_named(decl),
            Statement::ExportAllDeclaration(decl) => self.rewrite_export_all(decl),
            _ => {}
        }
    }

    fn rewrite_import(&mut self, decl: &ImportDeclaration) {
        if decl.import_kind.is_type() {
            self.remove(decl.span);
            return;
        }
        let source = decl.source.value.to_string();
        if let Some(global) = builtin_global(&source) {
            self.rewrite_builtin_import(decl, global);
            return;
        }

        let require = format!("require({})", js_string(&source));
        let specifiers = match &decl.specifiers {
            Some(specifiers) if !specifiers.is_empty() => specifiers,
            _ => {
                self.imports.push(source);
                self.replace(decl.span.start, decl.span.end, format!("{};", require));
                return;
            }
        };

        let mut default_local = None;
        let mut namespace_local = None;
        let mut named = Vec::new();
        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    default_local = Some(s.local.name.to_string());
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    namespace_local = Some(s.local.name.to_string());
                }
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        continue;
                    }
                    named.push(destructure_entry(
                        &export_name(&s.imported),
                        &s.local.name.to_string(),
                    ));
                }
            }
        }

        // `import { type A } from 's'` is elided like TypeScript does.
        if default_local.is_none() && namespace_local.is_none() && named.is_empty() {
            self.remove(decl.span);
            return;
        }

        self.imports.push(source);
        let mut lines = Vec::new();
        let module_var = match (&default_local, &namespace_local) {
            (_, Some(ns)) => {
                lines.push(format!("var {} = {};", ns, require));
                Some(ns.clone())
            }
            (Some(default), None) => {
                let var = format!("__mod_{}__", default);
                lines.push(format!("var {} = {};", var, require));
                Some(var)
            }
            (None, None) => None,
        };

        if let (Some(default), Some(var)) = (&default_local, &module_var) {
            lines.push(format!(
                "var {d} = {m} && {m}.__esModule ? {m}.default : {m};",
                d = default,
                m = var
            ));
        }

        if !named.is_empty() {
            let from = module_var.clone().unwrap_or_else(|| require.clone());
            lines.push(format!("var {{ {} }} = {};", named.join(", "), from));
        }

        self.replace(decl.span.start, decl.span.end, lines.join("\n"));
    }

    /// React specifiers never reach the loader. Their bindings read the
    /// preloaded global instead; names the sandbox already binds are skipped.
    fn rewrite_builtin_import(&mut self, decl: &ImportDeclaration, global: &str) {
        let mut lines = Vec::new();
        let mut named = Vec::new();
        for specifier in decl.specifiers.iter().flatten() {
            match specifier {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                    if s.local.name.as_str() != global {
                        lines.push(format!("var {} = {};", s.local.name, global));
                    }
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                    if s.local.name.as_str() != global {
                        lines.push(format!("var {} = {};", s.local.name, global));
                    }
                }
                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                    if s.import_kind.is_type() {
                        continue;
                    }
                    let imported = export_name(&s.imported);
                    let local = s.local.name.to_string();
                    let prebound = local == imported && HOOK_ALIASES.contains(&local.as_str());
                    if local == global || prebound {
                        continue;
                    }
                    named.push(destructure_entry(&imported, &local));
                }
            }
        }
        if !named.is_empty() {
            lines.push(format!("var {{ {} }} = {};", named.join(", "), global));
        }
        self.replace(decl.span.start, decl.span.end, lines.join("\n"));
    }

    fn rewrite_export_default(&mut self, decl: &ExportDefaultDeclaration) {
        let stmt = decl.span;
        match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                let name = func.id.as_ref().map(|id| id.name.to_string());
                self.rewrite_default_declaration(stmt, func.span, name);
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                let name = class.id.as_ref().map(|id| id.name.to_string());
                self.rewrite_default_declaration(stmt, class.span, name);
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(iface) => {
                self.replace(stmt.start, iface.span.start, "");
            }
            expression => {
                let expr_start = expression.span().start;
                let prefix_end = self
                    .keyword_end(stmt.start, "default")
                    .filter(|end| *end <= expr_start)
                    .unwrap_or(expr_start);
                let replacement = match self.mode {
                    RewriteMode::Module => "exports.default =",
                    RewriteMode::Entry if self.declares_app() => "",
                    RewriteMode::Entry => "var App =",
                };
                self.replace(stmt.start, prefix_end, replacement);
            }
        }
    }

    fn rewrite_default_declaration(&mut self, stmt: Span, decl: Span, name: Option<String>) {
        match (self.mode, name) {
            (RewriteMode::Module, Some(name)) => {
                self.replace(stmt.start, decl.start, "");
                self.default_export = Some(name);
            }
            (RewriteMode::Module, None) => {
                self.replace(stmt.start, decl.start, "exports.default = ");
                self.insert(stmt.end, ";");
            }
            (RewriteMode::Entry, Some(name)) => {
                self.replace(stmt.start, decl.start, "");
                if name != "App" && !self.declares_app() {
                    self.insert(stmt.end, format!("\nvar App = {};", name));
                }
            }
            (RewriteMode::Entry, None) => {
                if self.declares_app() {
                    self.remove(stmt);
                } else {
                    self.replace(stmt.start, decl.start, "var App = ");
                    self.insert(stmt.end, ";");
                }
            }
        }
    }

    fn rewrite_export_named(&mut self, decl: &ExportNamedDeclaration) {
        let stmt = decl.span;

        if let Some(declaration) = &decl.declaration {
            self.replace(stmt.start, declaration.span().start, "");
            if self.mode == RewriteMode::Module && !decl.export_kind.is_type() {
                for name in declared_names(declaration) {
                    self.named_exports.push((name.clone(), name));
                }
            }
            return;
        }

        if decl.export_kind.is_type() {
            self.remove(stmt);
            return;
        }

        let source = decl.source.as_ref().map(|s| s.value.to_string());
        match (self.mode, source) {
            (RewriteMode::Entry, None) => self.remove(stmt),
            (RewriteMode::Entry, Some(source)) => {
                // Re-exports from the entry keep their side effects only.
                self.imports.push(source.clone());
                self.replace(stmt.start, stmt.end, format!("require({});", js_string(&source)));
            }
            (RewriteMode::Module, None) => {
                self.remove(stmt);
                for export in &decl.specifiers {
                    if export.export_kind.is_type() {
                        continue;
                    }
                    let local = export_name(&export.local);
                    if self.type_names.contains(&local) {
                        continue;
                    }
                    self.named_exports.push((export_name(&export.exported), local));
                }
            }
            (RewriteMode::Module, Some(source)) => {
                let var = self.next_module_var();
                self.imports.push(source.clone());
                self.replace(
                    stmt.start,
                    stmt.end,
                    format!("var {} = require({});", var, js_string(&source)),
                );
                for export in &decl.specifiers {
                    if export.export_kind.is_type() {
                        continue;
                    }
                    let local = member_access(&var, &export_name(&export.local));
                    self.named_exports.push((export_name(&export.exported), local));
                }
            }
        }
    }

    fn rewrite_export_all(&mut self, decl: &ExportAllDeclaration) {
        let stmt = decl.span;
        if decl.export_kind.is_type() {
            self.remove(stmt);
            return;
        }
        let source = decl.source.value.to_string();
        self.imports.push(source.clone());
        if self.mode == RewriteMode::Entry {
            self.replace(stmt.start, stmt.end, format!("require({});", js_string(&source)));
            return;
        }

        let var = self.next_module_var();
        self.replace(
            stmt.start,
            stmt.end,
            format!("var {} = require({});", var, js_string(&source)),
        );
        match &decl.exported {
            Some(name) => self.named_exports.push((export_name(name), var)),
            None => self.star_exports.push(var),
        }
    }

    fn finish(mut self) -> RewriteOutput {
        // Insertions share a start offset with the replacement that follows
        // them; applying the wider range first keeps the insertion in front.
        self.replacements
            .sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut code = self.source.to_string();
        for (start, end, text) in &self.replacements {
            code.replace_range((*start as usize)..(*end as usize), text);
        }

        if self.mode == RewriteMode::Module {
            for var in &self.star_exports {
                code.push_str(&format!(
                    "\nObject.keys({v}).forEach(function (k) {{ if (k !== \"default\" && k !== \"__esModule\") exports[k] = {v}[k]; }});",
                    v = var
                ));
            }
            if let Some(name) = &self.default_export {
                code.push_str(&format!("\nexports.default = {};", name));
            }
            code.push_str("\nexports.__esModule = true;");
            for (exported, local) in &self.named_exports {
                code.push_str(&format!("\n{} = {};", member_access("exports", exported), local));
            }
            code.push('\n');
        }

        RewriteOutput {
            code,
            imports: self.imports,
            named_exports: self.named_exports.into_iter().map(|(name, _)| name).collect(),
            default_export: self.default_export,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// Double-quoted JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn property_key(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

fn member_access(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, js_string(name))
    }
}

/// One entry of a destructuring pattern binding `imported` to `local`.
fn destructure_entry(imported: &str, local: &str) -> String {
    if imported == local {
        local.to_string()
    } else {
        format!("{}: {}", property_key(imported), local)
    }
}

/// Value bindings introduced by a declaration. Ambient (`declare`) and
/// type-only declarations introduce none.
fn declared_names(declaration: &Declaration) -> Vec<String> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(var) if !var.declare => {
            for decl in &var.declarations {
                collect_binding_pattern(&decl.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(func) if !func.declare => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) if !class.declare => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::TSEnumDeclaration(decl) if !decl.declare => {
            names.push(decl.id.name.to_string());
        }
        _ => {}
    }
    names
}

fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            collect_binding_pattern(&assign.left, names);
        }
        #[allow(unreachable_patterns)]
        _ => {}
    }
}
