//! Detached preview window.
//!
//! The pop-out window keeps no connection state. It asks its opener for code
//! on open and then on a fixed interval, and re-renders only when the
//! returned js or css differs from what it last rendered. Polling bounds the
//! latency to one interval and cannot miss an update across window reloads.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::sandbox::{escape_inline_script, BuildPayload};

/// Messages exchanged between the host, the iframe and the detached window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PreviewMessage {
    /// window → host
    #[serde(rename = "PREVIEW_REQUEST_CODE")]
    RequestCode,
    /// host → window
    #[serde(rename = "PREVIEW_CODE_UPDATE")]
    CodeUpdate {
        js: String,
        css: String,
        #[serde(default)]
        scripts: Vec<String>,
    },
    /// sandbox → host
    #[serde(rename = "PREVIEW_RUNTIME_ERROR")]
    RuntimeError {
        message: String,
        #[serde(default)]
        stack: String,
        /// Fingerprint of the payload that raised it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        build: Option<String>,
    },
    /// sandbox → host
    #[serde(rename = "PREVIEW_RENDERED")]
    Rendered,
}

impl PreviewMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The update answering a poll. Before the first successful build the
    /// window receives empty code and keeps its current content.
    pub fn code_update(payload: Option<&BuildPayload>) -> Self {
        match payload {
            Some(payload) => PreviewMessage::CodeUpdate {
                js: payload.runtime_script.clone(),
                css: payload.stylesheet.clone(),
                scripts: payload.script_urls.clone(),
            },
            None => PreviewMessage::CodeUpdate {
                js: String::new(),
                css: String::new(),
                scripts: Vec::new(),
            },
        }
    }
}

/// The pop-out window document. It loads React once and then runs every
/// runtime script it is sent.
pub fn detached_window_document(config: &EngineConfig) -> String {
    let script = format!(
        r#"(function () {{
  var POLL_INTERVAL_MS = {poll_interval};
  var lastCode = '';
  var lastCss = '';
  var loadedScripts = {{}};

  function requestCode() {{
    if (window.opener && !window.opener.closed) {{
      window.opener.postMessage({{ type: 'PREVIEW_REQUEST_CODE' }}, '*');
    }}
  }}

  function loadScripts(urls, done) {{
    var pending = 0;
    urls.forEach(function (url) {{
      if (loadedScripts[url]) return;
      loadedScripts[url] = true;
      pending++;
      var tag = document.createElement('script');
      tag.src = url;
      tag.onload = tag.onerror = function () {{
        pending--;
        if (pending === 0) done();
      }};
      document.body.appendChild(tag);
    }});
    if (pending === 0) done();
  }}

  function renderPreview(js, css, scripts) {{
    document.getElementById('dynamic-styles').textContent = css || '';
    loadScripts(scripts || [], function () {{
      var tag = document.createElement('script');
      tag.textContent = js;
      document.body.appendChild(tag);
      tag.parentNode.removeChild(tag);
    }});
  }}

  window.addEventListener('message', function (event) {{
    var data = event.data;
    if (!data || data.type !== 'PREVIEW_CODE_UPDATE' || !data.js) return;
    if (data.js !== lastCode || data.css !== lastCss) {{
      lastCode = data.js;
      lastCss = data.css;
      renderPreview(data.js, data.css, data.scripts);
    }}
  }});

  requestCode();
  var updateInterval = setInterval(requestCode, POLL_INTERVAL_MS);
  window.addEventListener('beforeunload', function () {{
    clearInterval(updateInterval);
  }});
}})();"#,
        poll_interval = config.poll_interval_ms,
    );

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
      * {{ margin: 0; padding: 0; box-sizing: border-box; }}
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; padding: 20px; }}
      #root {{ width: 100%; }}
    </style>
    <style id="dynamic-styles"></style>
  </head>
  <body>
    <div id="root"></div>
    <script crossorigin src="{react_url}"></script>
    <script crossorigin src="{react_dom_url}"></script>
    <script>
{script}
    </script>
  </body>
</html>
"#,
        title = "Rerender Preview",
        react_url = config.react_url,
        react_dom_url = config.react_dom_url,
        script = escape_inline_script(&script),
    )
}
