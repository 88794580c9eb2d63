use crate::rewrite::{rewrite_module_syntax, RewriteMode};

fn entry(source: &str) -> String {
    rewrite_module_syntax(source, "App.jsx", RewriteMode::Entry)
        .unwrap()
        .code
}

fn module(source: &str) -> String {
    rewrite_module_syntax(source, "lib.jsx", RewriteMode::Module)
        .unwrap()
        .code
}

#[test]
fn test_default_and_named_import() {
    let out = entry("import Card, { helper, format as fmt } from './Card';\nconst x = 1;");
    assert_eq!(
        out,
        "var __mod_Card__ = require(\"./Card\");\n\
         var Card = __mod_Card__ && __mod_Card__.__esModule ? __mod_Card__.default : __mod_Card__;\n\
         var { helper, format: fmt } = __mod_Card__;\n\
         const x = 1;"
    );
}

#[test]
fn test_named_import_only() {
    assert_eq!(
        entry("import { a, b as c } from \"./utils\";"),
        "var { a, b: c } = require(\"./utils\");"
    );
}

#[test]
fn test_namespace_import() {
    assert_eq!(
        entry("import * as U from './utils';"),
        "var U = require(\"./utils\");"
    );
}

#[test]
fn test_default_import_only() {
    assert_eq!(
        entry("import Button from './Button';"),
        "var __mod_Button__ = require(\"./Button\");\n\
         var Button = __mod_Button__ && __mod_Button__.__esModule ? __mod_Button__.default : __mod_Button__;"
    );
}

#[test]
fn test_side_effect_import() {
    assert_eq!(entry("import './styles.css';"), "require(\"./styles.css\");");
}

#[test]
fn test_default_as_named_import() {
    assert_eq!(
        entry("import { default as X } from './x';"),
        "var { default: X } = require(\"./x\");"
    );
}

#[test]
fn test_react_imports_are_removed() {
    let out = rewrite_module_syntax(
        "import React, { useState } from 'react';\nimport ReactDOM from 'react-dom/client';\nfunction App() {}",
        "App.jsx",
        RewriteMode::Entry,
    )
    .unwrap();
    assert_eq!(out.code, "\n\nfunction App() {}");
    assert!(out.imports.is_empty());
}

#[test]
fn test_react_bindings_read_the_preloaded_globals() {
    let out = rewrite_module_syntax(
        "import R, { cloneElement, useState as useS, useEffect } from 'react';\nimport * as Dom from 'react-dom/client';\nimport { createRoot } from 'react-dom/client';",
        "App.jsx",
        RewriteMode::Entry,
    )
    .unwrap();
    assert_eq!(
        out.code,
        "var R = React;\nvar { cloneElement, useState: useS } = React;\n\
         var Dom = ReactDOM;\n\
         var { createRoot } = ReactDOM;"
    );
    assert!(out.imports.is_empty());
}

#[test]
fn test_react_namespace_import_in_module() {
    assert_eq!(
        module("import * as R from 'react';\nexport class Box extends R.Component {}"),
        "var R = React;\nclass Box extends R.Component {}\nexports.__esModule = true;\nexports.Box = Box;\n"
    );
}

#[test]
fn test_imports_are_listed_in_source_order() {
    let out = rewrite_module_syntax(
        "import a from './a';\nimport './b.css';\nimport React from 'react';\nimport { c } from 'lodash';",
        "App.jsx",
        RewriteMode::Entry,
    )
    .unwrap();
    assert_eq!(out.imports, vec!["./a", "./b.css", "lodash"]);
}

#[test]
fn test_entry_strips_default_export_of_app() {
    assert_eq!(
        entry("export default function App() { return null; }"),
        "function App() { return null; }"
    );
}

#[test]
fn test_entry_strips_named_exports() {
    assert_eq!(
        entry("export const x = 1;\nexport function App() {}"),
        "const x = 1;\nfunction App() {}"
    );
}

#[test]
fn test_entry_binds_default_expression_to_app() {
    assert_eq!(
        entry("function Main() {}\nexport default Main;"),
        "function Main() {}\nvar App = Main;"
    );
}

#[test]
fn test_entry_binds_named_default_to_app() {
    assert_eq!(
        entry("export default function Main() {}"),
        "function Main() {}\nvar App = Main;"
    );
}

#[test]
fn test_entry_rewrite_is_idempotent() {
    let sources = [
        "import Card from './Card';\nexport default function App() { return <Card />; }",
        "export const x = 1;\nfunction Main() {}\nexport default Main;",
        "export default function Main() {}\nexport { Main as Other };",
    ];
    for source in sources {
        let once = entry(source);
        assert_eq!(entry(&once), once, "source: {}", source);
    }
}

#[test]
fn test_module_named_declaration() {
    let out = rewrite_module_syntax("export const double = x => x * 2;", "utils.js", RewriteMode::Module).unwrap();
    assert_eq!(
        out.code,
        "const double = x => x * 2;\nexports.__esModule = true;\nexports.double = double;\n"
    );
    assert_eq!(out.named_exports, vec!["double"]);
    assert_eq!(out.default_export, None);
}

#[test]
fn test_module_destructured_declaration() {
    let out = rewrite_module_syntax("export const { a, b: [c] } = obj;", "m.js", RewriteMode::Module).unwrap();
    assert_eq!(out.named_exports, vec!["a", "c"]);
    assert!(out.code.ends_with("exports.a = a;\nexports.c = c;\n"));
}

#[test]
fn test_module_named_default_declaration() {
    let out = rewrite_module_syntax(
        "export default function Card() { return null; }",
        "Card.jsx",
        RewriteMode::Module,
    )
    .unwrap();
    assert_eq!(
        out.code,
        "function Card() { return null; }\nexports.default = Card;\nexports.__esModule = true;\n"
    );
    assert_eq!(out.default_export.as_deref(), Some("Card"));
}

#[test]
fn test_module_default_expression() {
    assert_eq!(
        module("export default () => 1;"),
        "exports.default = () => 1;\nexports.__esModule = true;\n"
    );
}

#[test]
fn test_module_anonymous_default_function() {
    assert_eq!(
        module("export default function () { return 1; }"),
        "exports.default = function () { return 1; };\nexports.__esModule = true;\n"
    );
}

#[test]
fn test_module_export_list_is_assigned_at_end() {
    assert_eq!(
        module("const a = 1;\nconst b = 2;\nexport { a, b as c };"),
        "const a = 1;\nconst b = 2;\n\nexports.__esModule = true;\nexports.a = a;\nexports.c = b;\n"
    );
}

#[test]
fn test_module_export_list_with_string_name() {
    let out = module("const a = 1;\nexport { a as \"my-a\" };");
    assert!(out.contains("exports[\"my-a\"] = a;"), "got: {}", out);
}

#[test]
fn test_module_named_reexport() {
    assert_eq!(
        module("export { x as y } from './x';"),
        "var __reexport_1__ = require(\"./x\");\nexports.__esModule = true;\nexports.y = __reexport_1__.x;\n"
    );
}

#[test]
fn test_module_star_reexport() {
    let out = module("export * from './x';");
    assert!(out.starts_with("var __reexport_1__ = require(\"./x\");\nObject.keys(__reexport_1__).forEach("));
    assert!(out.ends_with("exports.__esModule = true;\n"));
}

#[test]
fn test_module_namespace_reexport() {
    let out = module("export * as helpers from './helpers';");
    assert!(out.ends_with("exports.helpers = __reexport_1__;\n"), "got: {}", out);
}

#[test]
fn test_type_only_syntax_is_elided() {
    let out = rewrite_module_syntax(
        "import type { P } from './types';\nimport { type Q, n as m } from './q';\nexport interface I { a: number }\nexport type R = string;\nexport const n: number = 1;",
        "m.ts",
        RewriteMode::Module,
    )
    .unwrap();
    assert!(!out.code.contains("./types"), "got: {}", out.code);
    assert!(out.code.contains("var { n: m } = require(\"./q\");"));
    assert!(out.code.contains("interface I { a: number }"));
    assert!(out.code.contains("type R = string;"));
    assert_eq!(out.named_exports, vec!["n"]);
    assert_eq!(out.imports, vec!["./q"]);
}

#[test]
fn test_non_module_code_is_untouched() {
    let source = "// import x from 'y'\nconst s = \"export default 1\";\nfunction App() { return s; }";
    assert_eq!(entry(source), source);
}

#[test]
fn test_syntax_error_is_reported() {
    let err = rewrite_module_syntax("function App() { return 1; ", "App.jsx", RewriteMode::Entry).unwrap_err();
    assert_eq!(err.file, "App.jsx");
    assert!(err.user_message().starts_with("Compilation Error: App.jsx: "));
}

#[test]
fn test_handwritten_requires_are_listed() {
    let out = rewrite_module_syntax(
        "import a from './a';\nconst b = require('./b');\nconst React = require('react');\nfunction f() { return require('./a'); }",
        "App.jsx",
        RewriteMode::Entry,
    )
    .unwrap();
    assert_eq!(out.imports, vec!["./a", "./b"]);
}
