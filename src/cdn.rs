//! CDN Dependency Mapper
//!
//! Third-party packages are not bundled. Each supported package is loaded
//! from a pinned CDN build and exposes a global once its script has run.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::paths::base_package;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyDescriptor {
    pub package_name: String,
    pub cdn_url: String,
    /// Packages that only decorate the page (icon fonts) expose no global.
    #[serde(default)]
    pub global_name: Option<String>,
}

lazy_static! {
    static ref BUILTIN_CATALOG: Vec<(&'static str, &'static str, Option<&'static str>)> = vec![
        // Utilities
        ("lodash", "https://cdn.jsdelivr.net/npm/lodash@4.17.21/lodash.min.js", Some("_")),
        ("axios", "https://cdn.jsdelivr.net/npm/axios@1.6.0/dist/axios.min.js", Some("axios")),
        ("moment", "https://cdn.jsdelivr.net/npm/moment@2.29.4/moment.min.js", Some("moment")),
        ("dayjs", "https://cdn.jsdelivr.net/npm/dayjs@1.11.10/dayjs.min.js", Some("dayjs")),
        ("date-fns", "https://cdn.jsdelivr.net/npm/date-fns@2.30.0/index.min.js", None),
        ("uuid", "https://cdn.jsdelivr.net/npm/uuid@9.0.0/dist/umd/uuidv4.min.js", Some("uuid")),
        ("nanoid", "https://cdn.jsdelivr.net/npm/nanoid@5.0.3/nanoid.js", Some("nanoid")),
        ("clsx", "https://cdn.jsdelivr.net/npm/clsx@2.0.0/dist/clsx.min.js", Some("clsx")),
        ("classnames", "https://cdn.jsdelivr.net/npm/classnames@2.3.2/index.js", Some("classnames")),
        ("immer", "https://cdn.jsdelivr.net/npm/immer@10.0.3/dist/immer.umd.production.min.js", None),
        // State management
        ("redux", "https://cdn.jsdelivr.net/npm/redux@4.2.1/dist/redux.min.js", Some("Redux")),
        ("react-redux", "https://cdn.jsdelivr.net/npm/react-redux@8.1.3/dist/react-redux.min.js", Some("ReactRedux")),
        ("@reduxjs/toolkit", "https://cdn.jsdelivr.net/npm/@reduxjs/toolkit@1.9.7/dist/redux-toolkit.umd.min.js", None),
        ("zustand", "https://cdn.jsdelivr.net/npm/zustand@4.4.0/umd/index.production.js", Some("create")),
        // Forms & validation
        ("formik", "https://cdn.jsdelivr.net/npm/formik@2.4.5/dist/formik.umd.production.min.js", Some("Formik")),
        ("yup", "https://cdn.jsdelivr.net/npm/yup@1.3.2/yup.min.js", Some("yup")),
        ("zod", "https://cdn.jsdelivr.net/npm/zod@3.22.4/lib/index.umd.js", Some("z")),
        // UI & styling
        ("styled-components", "https://cdn.jsdelivr.net/npm/styled-components@6.1.1/dist/styled-components.min.js", Some("styled")),
        ("@emotion/react", "https://cdn.jsdelivr.net/npm/@emotion/react@11.11.1/dist/emotion-react.umd.min.js", Some("emotionReact")),
        ("@emotion/styled", "https://cdn.jsdelivr.net/npm/@emotion/styled@11.11.0/dist/emotion-styled.umd.min.js", Some("emotionStyled")),
        ("@mui/system", "https://cdn.jsdelivr.net/npm/@mui/system@5.15.0/umd/mui-system.production.min.js", Some("MuiSystem")),
        ("@mui/material", "https://cdn.jsdelivr.net/npm/@mui/material@5.15.0/umd/material-ui.production.min.js", Some("MaterialUI")),
        // Routing
        ("react-router-dom", "https://cdn.jsdelivr.net/npm/react-router-dom@6.20.0/dist/umd/react-router-dom.production.min.js", Some("ReactRouterDOM")),
        // Animation
        ("framer-motion", "https://cdn.jsdelivr.net/npm/framer-motion@10.16.5/dist/framer-motion.js", Some("FramerMotion")),
        ("gsap", "https://cdn.jsdelivr.net/npm/gsap@3.12.2/dist/gsap.min.js", Some("gsap")),
        // Charts
        ("chart.js", "https://cdn.jsdelivr.net/npm/chart.js@4.4.1/dist/chart.umd.min.js", Some("Chart")),
        ("recharts", "https://cdn.jsdelivr.net/npm/recharts@2.10.1/umd/Recharts.min.js", Some("Recharts")),
        // Icons
        ("react-icons", "https://cdn.jsdelivr.net/npm/react-icons@4.12.0/lib/index.js", Some("reactIcons")),
        ("@fortawesome/fontawesome-free", "https://cdn.jsdelivr.net/npm/@fortawesome/fontawesome-free@6.4.0/js/all.min.js", None),
    ];
}

/// Lookup table from package name to its CDN build.
#[derive(Debug, Clone, Default)]
pub struct DependencyCatalog {
    entries: BTreeMap<String, DependencyDescriptor>,
}

impl DependencyCatalog {
    pub fn builtin() -> Self {
        let entries = BUILTIN_CATALOG
            .iter()
            .map(|(name, url, global)| {
                (
                    name.to_string(),
                    DependencyDescriptor {
                        package_name: name.to_string(),
                        cdn_url: url.to_string(),
                        global_name: global.map(|g| g.to_string()),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Add or override catalog entries (from configuration).
    pub fn with_extra(mut self, extra: &[DependencyDescriptor]) -> Self {
        for descriptor in extra {
            self.entries
                .insert(descriptor.package_name.clone(), descriptor.clone());
        }
        self
    }

    pub fn get(&self, package_name: &str) -> Option<&DependencyDescriptor> {
        self.entries.get(package_name)
    }

    pub fn contains(&self, package_name: &str) -> bool {
        self.entries.contains_key(package_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Script URLs for the requested packages, in request order.
    /// Unknown packages are skipped with a warning.
    pub fn resolve_script_tags(&self, requested: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        for name in requested {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.entries.get(name) {
                Some(descriptor) => urls.push(descriptor.cdn_url.clone()),
                None => {
                    tracing::warn!(package = %name, "no CDN build for requested dependency, skipping");
                }
            }
        }
        urls
    }

    /// Requested packages the catalog does not know.
    pub fn unknown<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        requested
            .iter()
            .filter(|name| !self.entries.contains_key(name.as_str()))
            .map(|name| name.as_str())
            .collect()
    }

    /// Global a specifier resolves to: the exact package first, then the
    /// base package for subpath imports such as `@mui/material/Alert`.
    pub fn resolve_global(&self, specifier: &str) -> Option<&str> {
        if let Some(descriptor) = self.entries.get(specifier) {
            return descriptor.global_name.as_deref();
        }
        let base = base_package(specifier);
        if base == specifier {
            return None;
        }
        self.entries
            .get(base)
            .and_then(|descriptor| descriptor.global_name.as_deref())
    }

    /// Whether a bare specifier is served by the catalog (directly or as a
    /// subpath of a known package).
    pub fn serves(&self, specifier: &str) -> bool {
        self.entries.contains_key(specifier) || self.entries.contains_key(base_package(specifier))
    }

    /// package name → global name, for every package exposing a global.
    pub fn globals_table(&self) -> BTreeMap<String, String> {
        self.entries
            .values()
            .filter_map(|d| {
                d.global_name
                    .as_ref()
                    .map(|g| (d.package_name.clone(), g.clone()))
            })
            .collect()
    }
}
