//! `package.json` reading.
//!
//! Only the fields that influence browser-oriented resolution are modeled:
//! `name`, `main` and the `browser` field in its string or object form.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// Parsed package manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub browser: Option<BrowserField>,
}

/// The `browser` field: an entry override or a replacement map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BrowserField {
    Entry(String),
    Map(BTreeMap<String, BrowserTarget>),
}

/// Target of a `browser` map entry. `false` disables the module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BrowserTarget {
    Path(String),
    Disabled(bool),
}

/// Outcome of looking a file up in a `browser` replacement map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Use this package-relative path instead.
    Path(String),
    /// The module is stubbed out with empty content.
    Empty,
}

impl PackageManifest {
    /// Entry file declared for browsers: a string `browser` field wins over `main`.
    #[must_use]
    pub fn entry(&self) -> Option<&str> {
        match &self.browser {
            Some(BrowserField::Entry(entry)) => Some(entry.as_str()),
            _ => self.main.as_deref(),
        }
    }

    /// Look up a package-relative file (or bare name) in the `browser` map.
    ///
    /// Keys are compared with and without a leading `./`.
    #[must_use]
    pub fn replacement(&self, key: &str) -> Option<Replacement> {
        let Some(BrowserField::Map(map)) = &self.browser else {
            return None;
        };

        let bare = key.trim_start_matches("./");
        let target = map
            .get(key)
            .or_else(|| map.get(bare))
            .or_else(|| map.get(&format!("./{bare}")))?;

        match target {
            BrowserTarget::Path(path) => Some(Replacement::Path(path.clone())),
            BrowserTarget::Disabled(false) => Some(Replacement::Empty),
            BrowserTarget::Disabled(true) => None,
        }
    }
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|e| Error::ManifestMalformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// A manifest together with the directory it was found in.
#[derive(Debug, Clone)]
pub struct OwnedManifest {
    pub root: PathBuf,
    pub manifest: PackageManifest,
}

/// Find the closest manifest at or above `dir`.
///
/// Directories whose manifest cannot be parsed are skipped.
#[must_use]
pub fn find_owner(dir: &Path) -> Option<OwnedManifest> {
    let mut current = Some(dir);

    while let Some(dir) = current {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.is_file() {
            if let Ok(manifest) = read_manifest(&candidate) {
                return Some(OwnedManifest {
                    root: dir.to_path_buf(),
                    manifest,
                });
            }
        }
        current = dir.parent();
    }

    None
}

/// Entry source of the project in `base`.
///
/// Fails when the manifest declares neither a string `browser` field nor `main`.
pub fn project_entry(base: &Path) -> Result<String> {
    let path = base.join(MANIFEST_FILE);
    let manifest = read_manifest(&path)?;

    manifest
        .entry()
        .map(str::to_string)
        .ok_or_else(|| Error::ManifestMalformed {
            path,
            reason: "no browser or main field".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_browser_string_preferred_over_main() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"name": "app", "main": "server.js", "browser": "client.js"}"#,
        )
        .unwrap();
        assert_eq!(manifest.entry(), Some("client.js"));
    }

    #[test]
    fn test_main_used_with_browser_map() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{"main": "index.js", "browser": {"./lib/node.js": "./lib/web.js"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.entry(), Some("index.js"));
        assert_eq!(
            manifest.replacement("lib/node.js"),
            Some(Replacement::Path("./lib/web.js".to_string()))
        );
    }

    #[test]
    fn test_browser_false_disables_module() {
        let manifest: PackageManifest =
            serde_json::from_str(r#"{"browser": {"fs": false}}"#).unwrap();
        assert_eq!(manifest.replacement("fs"), Some(Replacement::Empty));
        assert_eq!(manifest.replacement("path"), None);
    }

    #[test]
    fn test_project_entry_missing_fields() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), r#"{"name": "app"}"#).unwrap();

        let err = project_entry(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed { .. }));
    }

    #[test]
    fn test_project_entry_invalid_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();

        let err = project_entry(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestMalformed { .. }));
    }

    #[test]
    fn test_find_owner_walks_up() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), r#"{"name": "app"}"#).unwrap();

        let owner = find_owner(&nested).unwrap();
        assert_eq!(owner.root, dir.path());
        assert_eq!(owner.manifest.name.as_deref(), Some("app"));
    }
}
