use crate::config::EngineConfig;
use crate::project::ProjectFiles;
use crate::registry::{ModuleRegistry, Resolved};
use crate::transpile::Transpiler;

fn build(files: ProjectFiles) -> ModuleRegistry {
    let bootstrap = EngineConfig::default().bootstrap_regex().unwrap();
    ModuleRegistry::build(&files, "App.jsx", &bootstrap, &Transpiler::default())
}

fn resolved_module<'a>(registry: &'a ModuleRegistry, specifier: &str, importer: Option<&str>) -> Option<&'a str> {
    match registry.resolve(specifier, importer) {
        Some(Resolved::Module(module)) => Some(module.path.as_str()),
        _ => None,
    }
}

#[test]
fn test_variant_lookup_finds_factory() {
    let registry = build(ProjectFiles::new().with("a/b.jsx", "export const v = 1;"));
    for specifier in ["./a/b", "a/b", "./a/b.jsx", "a/b.jsx"] {
        assert_eq!(resolved_module(&registry, specifier, None), Some("a/b.jsx"), "{}", specifier);
    }
    let factories = registry.factories_by_path_variant();
    assert!(factories["./a/b"].starts_with("function (module, exports, require) {\n"));
    assert_eq!(factories["./a/b"], factories["a/b.jsx"]);
}

#[test]
fn test_index_files_resolve_by_directory() {
    let registry = build(ProjectFiles::new().with("components/index.jsx", "export const v = 1;"));
    assert_eq!(
        resolved_module(&registry, "./components", None),
        Some("components/index.jsx")
    );
}

#[test]
fn test_extension_priority_breaks_ties() {
    let registry = build(
        ProjectFiles::new()
            .with("util.js", "export const from = 'js';")
            .with("util.tsx", "export const from = 'tsx';")
            .with("x.jsx", "export const from = 'jsx';")
            .with("x.ts", "export const from = 'ts';"),
    );
    assert_eq!(registry.module_aliases()["util"], "util.tsx");
    assert_eq!(registry.module_aliases()["./util"], "util.tsx");
    assert_eq!(registry.module_aliases()["util.js"], "util.js");
    assert_eq!(registry.module_aliases()["x"], "x.ts");
    assert_eq!(resolved_module(&registry, "./x.jsx", None), Some("x.jsx"));
}

#[test]
fn test_entry_and_bootstrap_are_excluded() {
    let registry = build(
        ProjectFiles::new()
            .with("App.jsx", "export default function App() {}")
            .with("App.tsx", "export default function App() {}")
            .with("index.jsx", "import App from './App';")
            .with("components/index.jsx", "export const v = 1;")
            .with("Button.jsx", "export default function Button() {}")
            .with("README.md", "# hi"),
    );
    let paths: Vec<&str> = registry.modules().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["Button.jsx", "components/index.jsx"]);
}

#[test]
fn test_broken_module_is_skipped() {
    let registry = build(
        ProjectFiles::new()
            .with("broken.jsx", "export const x = (;")
            .with("fine.js", "export const y = 2;"),
    );
    assert_eq!(registry.skipped().len(), 1);
    assert_eq!(registry.skipped()[0].path, "broken.jsx");
    assert!(registry.module("fine.js").is_some());
    assert!(registry.module("broken.jsx").is_none());
    assert_eq!(resolved_module(&registry, "./broken", None), None);
}

#[test]
fn test_stylesheets_are_registered_under_variants() {
    let registry = build(ProjectFiles::new().with("styles.css", "body { color: red; }"));
    let sheets = registry.stylesheets_by_path_variant();
    assert_eq!(sheets["styles.css"], "body { color: red; }");
    assert_eq!(sheets["./styles.css"], "body { color: red; }");
    assert!(matches!(
        registry.resolve("./styles.css", None),
        Some(Resolved::Stylesheet(sheet)) if sheet.path == "styles.css"
    ));
}

#[test]
fn test_relative_import_prefers_importer_directory() {
    let registry = build(
        ProjectFiles::new()
            .with("utils.js", "export const where = 'root';")
            .with("components/utils.js", "export const where = 'nested';")
            .with("components/Card.jsx", "import { where } from './utils';"),
    );
    assert_eq!(
        resolved_module(&registry, "./utils", Some("components/Card.jsx")),
        Some("components/utils.js")
    );
    assert_eq!(
        resolved_module(&registry, "../utils", Some("components/Card.jsx")),
        Some("utils.js")
    );
    assert_eq!(resolved_module(&registry, "./utils", None), Some("utils.js"));
}

#[test]
fn test_flat_namespace_fallback_from_nested_module() {
    let registry = build(
        ProjectFiles::new()
            .with("theme.js", "export const color = 'red';")
            .with("components/Card.jsx", "import { color } from './theme';"),
    );
    assert_eq!(
        resolved_module(&registry, "./theme", Some("components/Card.jsx")),
        Some("theme.js")
    );
}

#[test]
fn test_module_code_is_transpiled_and_exports_collected() {
    let registry = build(ProjectFiles::new().with(
        "Card.jsx",
        "import { helper } from './helper';\nexport default function Card() { return <div>{helper()}</div>; }",
    ));
    let card = registry.module("Card.jsx").unwrap();
    assert_eq!(card.imports, vec!["./helper"]);
    assert_eq!(card.default_export.as_deref(), Some("Card"));
    assert!(card.code.contains("React.createElement"), "got: {}", card.code);
    assert!(card.code.contains("exports.default = Card"), "got: {}", card.code);
    assert!(!card.code.contains("<div>"));
}
