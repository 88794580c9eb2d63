//! Sandbox Executor
//!
//! Assembles the isolated preview document. The document is self-contained:
//! React and the requested CDN scripts are loaded by URL, everything else
//! (stylesheet, module factories, entry code, loader, bootstrap, error
//! harness) is inlined.
//!
//! ## Loader
//!
//! Each build owns one loader object created by `createLoader(tables)`.
//! `require(id)` resolves in a fixed order:
//!
//! 1. React built-ins map to the preloaded globals.
//! 2. Known CDN packages map to their global, checked at call time.
//! 3. Stylesheets, over every candidate path. A stylesheet is injected once
//!    and yields an empty exports object.
//! 4. Scoped-package subpaths fall back to the base package global.
//! 5. Factories, over every candidate path. A factory runs at most once and
//!    is cached under its canonical path, so every alias sees the same
//!    exports object. Misses warn and yield `{}`.
//!
//! Runtime exceptions (synchronous, `error` and `unhandledrejection`) replace
//! the page with an error block and are posted to the host window. Every
//! posted message carries the payload fingerprint as `build`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::paths::{CANDIDATE_SUFFIXES, PREFIXED_SUFFIXES};
use crate::registry::ModuleRegistry;
use crate::rewrite::js_string;

pub const ENVIRONMENT_MISSING_MESSAGE: &str = "Failed to load React. Check connection.";
pub const MISSING_APP_MESSAGE: &str = "No App component found.";
pub const RUNTIME_ERROR_PREFIX: &str = "Runtime Error:";

/// Built-in specifiers and the global each one reads.
pub const BUILTIN_GLOBALS: [(&str, &str); 4] = [
    ("react", "React"),
    ("react-dom", "ReactDOM"),
    ("react-dom/client", "ReactDOM"),
    ("react/jsx-runtime", "React"),
];

/// React exports bound as plain names in every factory and in the entry.
pub const HOOK_ALIASES: [&str; 24] = [
    "useState",
    "useEffect",
    "useRef",
    "useMemo",
    "useCallback",
    "useReducer",
    "useContext",
    "useLayoutEffect",
    "useImperativeHandle",
    "useTransition",
    "useDeferredValue",
    "useSyncExternalStore",
    "useId",
    "useInsertionEffect",
    "createContext",
    "createRef",
    "forwardRef",
    "memo",
    "lazy",
    "Fragment",
    "Component",
    "PureComponent",
    "Suspense",
    "StrictMode",
];

lazy_static! {
    static ref SCRIPT_CLOSE_RE: Regex = Regex::new(r"(?i)</(script)").unwrap();
    static ref STYLE_CLOSE_RE: Regex = Regex::new(r"(?i)</(style)").unwrap();
}

/// Keep inline code from closing its `<script>` element early.
pub fn escape_inline_script(code: &str) -> Cow<'_, str> {
    SCRIPT_CLOSE_RE.replace_all(code, r"<\/${1}")
}

pub fn escape_inline_style(css: &str) -> Cow<'_, str> {
    STYLE_CLOSE_RE.replace_all(css, r"<\/${1}")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Everything the host needs to show one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPayload {
    /// Complete isolated document.
    pub html: String,
    /// The inline runtime on its own (loader, factories, entry, mount).
    pub runtime_script: String,
    pub stylesheet: String,
    /// Dependency script URLs in request order, React excluded.
    pub script_urls: Vec<String>,
    /// Build tag carried by every message the runtime posts to the host.
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    react_url: String,
    react_dom_url: String,
    entry_path: String,
}

impl SandboxExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            react_url: config.react_url.clone(),
            react_dom_url: config.react_dom_url.clone(),
            entry_path: config.entry_path.clone(),
        }
    }

    pub fn build(
        &self,
        entry_js: &str,
        stylesheet: Option<&str>,
        registry: &ModuleRegistry,
        script_urls: &[String],
        globals: &BTreeMap<String, String>,
    ) -> BuildPayload {
        let stylesheet = stylesheet.unwrap_or_default().to_string();
        let tables = self.loader_tables(registry, globals);
        let definitions = definitions(registry);
        let fingerprint = self.fingerprint(entry_js, &stylesheet, &tables, &definitions, script_urls);
        let runtime_script = self.runtime_script(entry_js, &tables, &definitions, &fingerprint);
        let html = self.document(&stylesheet, script_urls, &runtime_script);

        tracing::debug!(
            modules = registry.modules().count(),
            scripts = script_urls.len(),
            bytes = html.len(),
            "assembled sandbox document"
        );

        BuildPayload {
            html,
            runtime_script,
            stylesheet,
            script_urls: script_urls.to_vec(),
            fingerprint,
        }
    }

    /// SHA-256 over everything the document is assembled from. The runtime
    /// tags its host messages with it.
    fn fingerprint(
        &self,
        entry_js: &str,
        stylesheet: &str,
        tables: &str,
        definitions: &str,
        script_urls: &[String],
    ) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.react_url.as_str(),
            self.react_dom_url.as_str(),
            self.entry_path.as_str(),
            entry_js,
            stylesheet,
            tables,
            definitions,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        for url in script_urls {
            hasher.update(url.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Data tables handed to `createLoader`.
    fn loader_tables(&self, registry: &ModuleRegistry, globals: &BTreeMap<String, String>) -> String {
        let builtins: BTreeMap<&str, &str> = BUILTIN_GLOBALS.iter().copied().collect();
        let stylesheets: BTreeMap<&str, &str> = registry
            .stylesheets()
            .map(|s| (s.path.as_str(), s.text.as_str()))
            .collect();
        json!({
            "builtins": builtins,
            "globals": globals,
            "aliases": registry.module_aliases(),
            "stylesheetAliases": registry.stylesheet_aliases(),
            "stylesheets": stylesheets,
            "suffixes": CANDIDATE_SUFFIXES,
            "prefixedSuffixes": PREFIXED_SUFFIXES,
        })
        .to_string()
    }

    fn runtime_script(&self, entry_js: &str, tables: &str, definitions: &str, build: &str) -> String {
        let hooks = HOOK_ALIASES
            .iter()
            .map(|name| format!("  var {} = React.{};", name, name))
            .collect::<Vec<_>>()
            .join("\n");

        let script = format!(
            r#"(function () {{
  var __build__ = {build};

{harness}

  if (typeof React === 'undefined' || typeof ReactDOM === 'undefined') {{
    __container__().innerHTML =
      '<div style="color:red;padding:20px;">' + {environment_missing} + '</div>';
    return;
  }}

{loader}

  var __loader__ = createLoader({tables});
  var require = function (id) {{ return __loader__.load(id, {entry_path}); }};

{hooks}

  try {{
{definitions}

    {{
{entry}

      if (typeof App !== 'undefined') {{
        __mount__(App);
      }} else {{
        __container__().innerHTML =
          '<div style="color:#666;padding:20px;text-align:center;">' + {missing_app} + '</div>';
      }}
    }}
    __report__('PREVIEW_RENDERED', {{}});
  }} catch (err) {{
    __showError__(err);
  }}
}})();
"#,
            build = js_string(build),
            harness = HARNESS_SOURCE,
            environment_missing = js_string(ENVIRONMENT_MISSING_MESSAGE),
            loader = LOADER_SOURCE,
            tables = tables,
            entry_path = js_string(&self.entry_path),
            hooks = hooks,
            definitions = definitions,
            entry = entry_js,
            missing_app = js_string(MISSING_APP_MESSAGE),
        );

        escape_inline_script(&script).into_owned()
    }

    pub fn document(&self, stylesheet: &str, script_urls: &[String], runtime_script: &str) -> String {
        let dependency_tags = script_urls
            .iter()
            .map(|url| format!("    <script src=\"{}\"></script>", escape_attr(url)))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
{base_style}
/* project stylesheet */
{stylesheet}
    </style>
  </head>
  <body>
    <div id="root"></div>
    <script crossorigin src="{react_url}"></script>
    <script crossorigin src="{react_dom_url}"></script>
{dependency_tags}
    <script>
{runtime_script}
    </script>
  </body>
</html>
"#,
            base_style = BASE_STYLE,
            stylesheet = escape_inline_style(stylesheet),
            react_url = escape_attr(&self.react_url),
            react_dom_url = escape_attr(&self.react_dom_url),
            dependency_tags = dependency_tags,
            runtime_script = runtime_script,
        )
    }
}

fn definitions(registry: &ModuleRegistry) -> String {
    registry
        .modules()
        .map(|m| format!("  __loader__.define({}, {});", js_string(&m.path), m.factory_source()))
        .collect::<Vec<_>>()
        .join("\n")
}

const BASE_STYLE: &str = r#"      * { margin: 0; padding: 0; box-sizing: border-box; }
      body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', sans-serif;
        -webkit-font-smoothing: antialiased;
        padding: 20px;
        color: #1a1a1f;
        background: #f5f5f7;
      }
      #root { width: 100%; }"#;

/// Error block, host reporting and mounting. Shared by the iframe and the
/// detached window, so it looks the root container up on every use.
const HARNESS_SOURCE: &str = r#"  function __report__(type, payload) {
    try {
      var target = window.parent && window.parent !== window ? window.parent : window.opener;
      if (!target) return;
      var message = { type: type, build: __build__ };
      for (var key in payload) message[key] = payload[key];
      target.postMessage(message, '*');
    } catch (e) {}
  }

  function __container__() {
    var el = document.getElementById('root');
    if (!el) {
      el = document.createElement('div');
      el.id = 'root';
      document.body.appendChild(el);
    }
    return el;
  }

  function __showError__(err) {
    console.error('Runtime error:', err);
    var message = err && err.message ? err.message : String(err);
    var stack = err && err.stack ? err.stack : '';
    var errorDiv = document.createElement('div');
    errorDiv.setAttribute('data-rerender-error', '');
    errorDiv.style.cssText = 'color:red;padding:20px;font-family:monospace;white-space:pre-wrap;background:#fee;border:1px solid #fcc;border-radius:4px;margin:10px;';
    errorDiv.textContent = 'Runtime Error:\n' + message + '\n\n' + stack;
    if (window.__rerenderRoot__) {
      try { window.__rerenderRoot__.unmount(); } catch (e) {}
      window.__rerenderRoot__ = null;
    }
    document.body.innerHTML = '';
    document.body.appendChild(errorDiv);
    __report__('PREVIEW_RUNTIME_ERROR', { message: message, stack: stack });
  }

  if (!window.__rerenderHarness__) {
    window.__rerenderHarness__ = true;
    window.addEventListener('error', function (event) {
      window.__rerenderShowError__(event.error || new Error(event.message));
    });
    window.addEventListener('unhandledrejection', function (event) {
      var reason = event.reason;
      window.__rerenderShowError__(reason instanceof Error ? reason : new Error(String(reason)));
    });
  }
  window.__rerenderShowError__ = __showError__;

  function __mount__(Component) {
    if (window.__rerenderRoot__) {
      try { window.__rerenderRoot__.unmount(); } catch (e) {}
    }
    var container = __container__();
    var element = React.createElement(Component);
    if (ReactDOM.createRoot) {
      var root = ReactDOM.createRoot(container);
      window.__rerenderRoot__ = root;
      if (ReactDOM.flushSync) {
        ReactDOM.flushSync(function () { root.render(element); });
      } else {
        root.render(element);
      }
    } else {
      ReactDOM.render(element, container);
      window.__rerenderRoot__ = { unmount: function () { ReactDOM.unmountComponentAtNode(container); } };
    }
  }"#;

const LOADER_SOURCE: &str = r#"  function createLoader(tables) {
    var factories = {};
    var cache = {};
    var sheets = {};

    function has(table, key) {
      return Object.prototype.hasOwnProperty.call(table, key);
    }

    function stripDotSlash(path) {
      return path.indexOf('./') === 0 ? path.slice(2) : path;
    }

    function dirname(path) {
      path = stripDotSlash(path);
      var idx = path.lastIndexOf('/');
      return idx < 0 ? '' : path.slice(0, idx);
    }

    function joinRelative(dir, id) {
      var segments = dir.split('/').filter(Boolean);
      var parts = id.split('/');
      for (var i = 0; i < parts.length; i++) {
        var part = parts[i];
        if (part === '' || part === '.') continue;
        if (part === '..') {
          if (!segments.length) return null;
          segments.pop();
          continue;
        }
        segments.push(part);
      }
      return segments.join('/');
    }

    function expand(id, out) {
      var push = function (value) { if (out.indexOf(value) < 0) out.push(value); };
      push(id);
      var bare = stripDotSlash(id);
      tables.suffixes.forEach(function (suffix) { push(bare + suffix); });
      tables.prefixedSuffixes.forEach(function (suffix) { push('./' + bare + suffix); });
    }

    function candidates(id, importer) {
      var out = [];
      if (importer && (id.indexOf('./') === 0 || id.indexOf('../') === 0)) {
        var dir = dirname(importer);
        if (dir) {
          var joined = joinRelative(dir, id);
          if (joined !== null) expand(joined, out);
        }
      }
      expand(id, out);
      return out;
    }

    function basePackage(id) {
      var parts = id.split('/');
      return id.charAt(0) === '@' ? parts.slice(0, 2).join('/') : parts[0];
    }

    function execute(path) {
      if (has(cache, path)) return cache[path].exports;
      var module = { exports: {} };
      cache[path] = module;
      var scopedRequire = function (id) { return load(id, path); };
      factories[path].call(module.exports, module, module.exports, scopedRequire);
      return module.exports;
    }

    function load(id, importer) {
      if (has(tables.builtins, id)) return window[tables.builtins[id]];

      if (has(tables.globals, id)) {
        var globalName = tables.globals[id];
        if (typeof window[globalName] !== 'undefined') return window[globalName];
        console.warn('[CDN package loading] ' + id + ' (expected global: ' + globalName + ')');
      }

      var tries = candidates(id, importer);

      for (var i = 0; i < tries.length; i++) {
        if (has(tables.stylesheetAliases, tries[i])) {
          var sheet = tables.stylesheetAliases[tries[i]];
          if (!has(sheets, sheet)) {
            var style = document.createElement('style');
            style.setAttribute('data-module', sheet);
            style.textContent = tables.stylesheets[sheet];
            document.head.appendChild(style);
            sheets[sheet] = {};
          }
          return sheets[sheet];
        }
      }

      var base = basePackage(id);
      if (base !== id && has(tables.globals, base)) {
        var baseGlobal = window[tables.globals[base]];
        if (typeof baseGlobal !== 'undefined') return baseGlobal;
      }

      for (var j = 0; j < tries.length; j++) {
        if (has(tables.aliases, tries[j])) {
          var canonical = tables.aliases[tries[j]];
          if (has(factories, canonical)) return execute(canonical);
        }
      }

      console.warn('[Module not found]', id);
      return {};
    }

    return {
      define: function (path, factory) { factories[path] = factory; },
      load: load,
    };
  }"#;
