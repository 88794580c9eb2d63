use crate::bundle::{build_preview_json, BuildRequest, PreviewBuilder, UnresolvedImport};
use crate::config::EngineConfig;
use crate::project::ProjectFiles;

fn builder() -> PreviewBuilder {
    PreviewBuilder::new(EngineConfig::default()).unwrap()
}

#[test]
fn test_scenario_single_entry_renders() {
    let output = builder()
        .build(&BuildRequest::new("function App(){ return <div>Hi</div>; }"))
        .unwrap();
    let runtime = &output.payload.runtime_script;
    assert!(runtime.contains("React.createElement"), "got: {}", runtime);
    assert!(runtime.contains("\"Hi\""));
    assert!(output.report.modules.is_empty());
    assert!(output.report.unresolved.is_empty());
    assert!(output.report.skipped.is_empty());
}

#[test]
fn test_scenario_sibling_named_import() {
    let request = BuildRequest::new(
        "import { double } from './utils.js';\nfunction App(){ return <div>{double(2)}</div>; }",
    )
    .with_files(ProjectFiles::new().with("utils.js", "export const double = x => x*2;"));
    let output = builder().build(&request).unwrap();

    assert_eq!(output.report.modules, vec!["utils.js"]);
    assert!(output.report.unresolved.is_empty());
    let runtime = &output.payload.runtime_script;
    assert!(runtime.contains("require(\"./utils.js\")"), "got: {}", runtime);
    assert!(runtime.contains("exports.double = double"));
    assert!(runtime.contains("\"./utils.js\":\"utils.js\""));
}

#[test]
fn test_scenario_entry_syntax_error_fails_build() {
    let err = builder()
        .build(&BuildRequest::new("function App(){ return <div>Hi</div>; "))
        .unwrap_err();
    assert_eq!(err.file, "App.jsx");
    let message = err.user_message();
    assert!(message.starts_with("Compilation Error: "));
    assert!(message.len() > "Compilation Error: ".len());
}

#[test]
fn test_scenario_unlisted_package_degrades() {
    let request = BuildRequest::new(
        "import confetti from 'canvas-confetti';\nfunction App(){ return <div>{String(confetti)}</div>; }",
    );
    let output = builder().build(&request).unwrap();
    assert_eq!(
        output.report.unresolved,
        vec![UnresolvedImport {
            importer: "App.jsx".to_string(),
            specifier: "canvas-confetti".to_string(),
        }]
    );
    assert!(output.payload.runtime_script.contains("require(\"canvas-confetti\")"));
}

#[test]
fn test_dependencies_map_to_scripts() {
    let builder = builder();
    let request = BuildRequest::new(
        "import _ from 'lodash';\nimport { Alert } from '@mui/material/Alert';\nfunction App(){ return null; }",
    )
    .with_dependencies(["lodash", "not-a-package", "lodash", "@mui/material"]);
    let output = builder.build(&request).unwrap();

    let lodash = builder.catalog().get("lodash").unwrap().cdn_url.clone();
    let mui = builder.catalog().get("@mui/material").unwrap().cdn_url.clone();
    assert_eq!(output.payload.script_urls, vec![lodash, mui]);
    assert_eq!(output.report.unknown_dependencies, vec!["not-a-package"]);
    assert!(output.report.unresolved.is_empty(), "{:?}", output.report.unresolved);
}

#[test]
fn test_known_package_not_requested_is_unresolved() {
    let output = builder()
        .build(&BuildRequest::new("import axios from 'axios';\nfunction App(){ return null; }"))
        .unwrap();
    assert_eq!(output.report.unresolved.len(), 1);
    assert_eq!(output.report.unresolved[0].specifier, "axios");
}

#[test]
fn test_broken_sibling_does_not_fail_build() {
    let request = BuildRequest::new("import Card from './Card';\nfunction App(){ return <Card />; }")
        .with_files(
            ProjectFiles::new()
                .with("Card.jsx", "export default function Card() { return <div>; }")
                .with("Other.jsx", "export const ok = 1;"),
        );
    let output = builder().build(&request).unwrap();
    assert_eq!(output.report.skipped.len(), 1);
    assert_eq!(output.report.skipped[0].path, "Card.jsx");
    assert_eq!(output.report.modules, vec!["Other.jsx"]);
    assert_eq!(output.report.unresolved[0].specifier, "./Card");
}

#[test]
fn test_entry_file_in_project_map_is_not_registered() {
    let entry = "export default function App(){ return <p>entry</p>; }";
    let request = BuildRequest::new(entry).with_files(
        ProjectFiles::new()
            .with("App.jsx", entry)
            .with("index.jsx", "import App from './App';"),
    );
    let output = builder().build(&request).unwrap();
    assert!(output.report.modules.is_empty());
}

#[test]
fn test_nested_relative_imports_resolve() {
    let request = BuildRequest::new("import Card from './components/Card';\nfunction App(){ return <Card />; }")
        .with_files(
            ProjectFiles::new()
                .with("components/Card.jsx", "import { tone } from './theme';\nexport default function Card() { return <b>{tone}</b>; }")
                .with("components/theme.js", "export const tone = 'dark';"),
        );
    let output = builder().build(&request).unwrap();
    assert!(output.report.unresolved.is_empty(), "{:?}", output.report.unresolved);
}

#[test]
fn test_stylesheet_is_carried() {
    let request = BuildRequest::new("function App(){ return null; }").with_stylesheet("h1 { color: teal; }");
    let output = builder().build(&request).unwrap();
    assert_eq!(output.payload.stylesheet, "h1 { color: teal; }");
    assert!(output.payload.html.contains("h1 { color: teal; }"));
}

#[test]
fn test_request_fingerprint_tracks_every_input() {
    let base = BuildRequest::new("function App(){}");
    let variants = [
        BuildRequest::new("function App(){ }"),
        base.clone().with_stylesheet(""),
        base.clone().with_dependencies(["lodash"]),
        base.clone().with_files(ProjectFiles::new().with("a.js", "")),
    ];
    for other in &variants {
        assert_ne!(base.fingerprint(), other.fingerprint(), "{:?}", other);
    }
    assert_eq!(base.fingerprint(), base.clone().fingerprint());
}

#[test]
fn test_json_bridge() {
    let out = build_preview_json(
        r#"{
            "config": { "entryPath": "Main.jsx" },
            "entrySource": "function App(){ return null; }",
            "files": { "utils.js": "export const a = 1;" },
            "dependencies": []
        }"#,
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["report"]["modules"][0], "utils.js");
    assert!(value["payload"]["html"].as_str().unwrap().contains("<!DOCTYPE html>"));
}

#[test]
fn test_json_bridge_reports_compile_errors() {
    let err = build_preview_json(r#"{ "entrySource": "function App( {" }"#).unwrap_err();
    assert!(err.starts_with("Compilation Error: App.jsx"), "{}", err);
}
