//! Path Normalizer
//!
//! Virtual project paths are forward-slash keys relative to the project root.
//! A module is reachable under several spellings (with or without extension,
//! with or without a leading `./`), and an import specifier expands into an
//! ordered list of candidates that is tried front to back.

use lazy_static::lazy_static;
use regex::Regex;

/// Script extensions in collision priority order: when two files share an
/// extension-less alias, the earlier extension owns it.
pub const SCRIPT_EXTENSIONS: [&str; 4] = ["tsx", "ts", "jsx", "js"];

pub const STYLESHEET_EXTENSIONS: [&str; 1] = ["css"];

/// Suffixes appended to the bare specifier, in lookup order.
pub const CANDIDATE_SUFFIXES: [&str; 9] = [
    "",
    ".jsx",
    ".js",
    ".tsx",
    ".ts",
    "/index.jsx",
    "/index.js",
    "/index.tsx",
    "/index.ts",
];

/// Suffixes tried once more behind a leading `./`.
pub const PREFIXED_SUFFIXES: [&str; 5] = ["", ".jsx", ".js", ".tsx", ".ts"];

lazy_static! {
    static ref SCRIPT_EXT_RE: Regex = Regex::new(r"^(.*)\.(jsx?|tsx?)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script(&'static str),
    Stylesheet,
    Other,
}

pub fn classify(path: &str) -> FileKind {
    if let Some(ext) = extension(path) {
        if let Some(script) = SCRIPT_EXTENSIONS.iter().find(|e| **e == ext) {
            return FileKind::Script(script);
        }
        if STYLESHEET_EXTENSIONS.contains(&ext) {
            return FileKind::Stylesheet;
        }
    }
    FileKind::Other
}

fn extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext)
}

/// Lower is stronger. Non-script paths rank after every script extension.
pub fn extension_rank(path: &str) -> usize {
    match classify(path) {
        FileKind::Script(ext) => SCRIPT_EXTENSIONS
            .iter()
            .position(|e| *e == ext)
            .unwrap_or(SCRIPT_EXTENSIONS.len()),
        _ => SCRIPT_EXTENSIONS.len(),
    }
}

/// Strip a trailing script extension, if any.
pub fn strip_script_extension(path: &str) -> &str {
    match SCRIPT_EXT_RE.captures(path).and_then(|c| c.get(1)) {
        Some(stem) => stem.as_str(),
        None => path,
    }
}

fn strip_dot_slash(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// Every spelling under which `path` is registered.
///
/// Order: the path itself, its extension-less form, then `./`-prefixed
/// duplicates of both.
pub fn path_variants(path: &str) -> Vec<String> {
    let mut variants = Vec::new();
    push_unique(&mut variants, path.to_string());

    let bare = strip_dot_slash(path);
    let no_ext = strip_script_extension(bare);
    push_unique(&mut variants, bare.to_string());
    if no_ext != bare {
        push_unique(&mut variants, no_ext.to_string());
    }

    push_unique(&mut variants, format!("./{}", bare));
    if no_ext != bare {
        push_unique(&mut variants, format!("./{}", no_ext));
    }
    variants
}

/// Directory part of a project path ("" for root files).
pub fn dirname(path: &str) -> &str {
    let path = strip_dot_slash(path);
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve a relative specifier against a directory, collapsing `.` and `..`.
/// Returns `None` when the result would escape the project root.
pub fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

fn specifier_candidates(specifier: &str, out: &mut Vec<String>) {
    push_unique(out, specifier.to_string());
    let bare = strip_dot_slash(specifier);
    for suffix in CANDIDATE_SUFFIXES {
        push_unique(out, format!("{}{}", bare, suffix));
    }
    for suffix in PREFIXED_SUFFIXES {
        push_unique(out, format!("./{}{}", bare, suffix));
    }
}

/// Ordered lookup keys for `specifier` as required from `importer`.
///
/// Relative specifiers from a nested module are resolved against the
/// importer's directory first; the root-relative spellings follow so that
/// projects written against a flat namespace keep resolving.
pub fn candidate_paths(specifier: &str, importer: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(importer) = importer {
        let dir = dirname(importer);
        if is_relative(specifier) && !dir.is_empty() {
            if let Some(joined) = join_relative(dir, specifier) {
                specifier_candidates(&joined, &mut out);
            }
        }
    }
    specifier_candidates(specifier, &mut out);
    out
}

/// npm package a bare specifier belongs to (`@scope/pkg/sub` → `@scope/pkg`).
pub fn base_package(specifier: &str) -> &str {
    let mut parts = specifier.splitn(3, '/');
    let first = parts.next().unwrap_or(specifier);
    if first.starts_with('@') {
        match parts.next() {
            Some(second) => &specifier[..first.len() + 1 + second.len()],
            None => specifier,
        }
    } else {
        first
    }
}
