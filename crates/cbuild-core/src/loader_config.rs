//! Loader configuration documents.
//!
//! A document is a script made of `System.config({...});` calls whose
//! argument is an object literal. Hand-written configs use bare keys,
//! single quotes and trailing commas, so arguments are read as JSON5.
//! Later calls override keys of earlier ones.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const CONFIG_CALL: &str = "System.config(";

/// Loader configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Package name to package root path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub map: BTreeMap<String, String>,
    /// Path pattern to per-module metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, MetaConfig>,
    /// Package root path to package overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, PackageConfig>,
}

/// Metadata applied to every module matching a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Global name to module id providing it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, String>,
}

/// Per-package overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Entry file relative to the package root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// `./`-prefixed package-relative path remaps.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub map: BTreeMap<String, String>,
}

impl LoaderConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.meta.is_empty() && self.packages.is_empty()
    }

    /// Merge `other` into `self`, letting `other` win on key collisions.
    pub fn merge(&mut self, other: LoaderConfig) {
        self.map.extend(other.map);
        self.meta.extend(other.meta);
        self.packages.extend(other.packages);
    }

    /// Parse every `System.config` call in `text`.
    ///
    /// `origin` names the text in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut rest = text;

        while let Some(pos) = rest.find(CONFIG_CALL) {
            let after = &rest[pos + CONFIG_CALL.len()..];
            let (start, end) = object_literal(after).ok_or_else(|| Error::ConfigParse {
                origin: origin.to_string(),
                reason: "System.config call without an object argument".to_string(),
            })?;

            let parsed: Self =
                json5::from_str(&after[start..end]).map_err(|e| Error::ConfigParse {
                    origin: origin.to_string(),
                    reason: e.to_string(),
                })?;
            config.merge(parsed);

            rest = &after[end..];
        }

        Ok(config)
    }

    /// Load the configuration file at `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no loader config, starting empty");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Render as a single `System.config` call, or nothing when empty.
    pub fn render(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }

        let body = serde_json::to_string_pretty(self)
            .map_err(|e| Error::other(format!("failed to render loader config: {e}")))?;
        Ok(format!("{CONFIG_CALL}{body});\n"))
    }
}

/// Byte range of the brace-balanced object literal `text` starts with,
/// after optional whitespace. Strings and comments are skipped.
fn object_literal(text: &str) -> Option<(usize, usize)> {
    let start = text.len() - text.trim_start().len();
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            q @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}
