//! Bookkeeping accumulated during one build run.
//!
//! The ledger holds two tables:
//! - the fix table: absolute path that failed to resolve → absolute path it
//!   was corrected to (directory → index file and relative specifier fixes)
//! - the repo table: repo root (the outermost `node_modules` above a package)
//!   → package name → [`PackageSpec`]
//!
//! Package entries seeded from a configuration that no name maps to are
//! kept aside, keyed by root path.

use crate::loader_config::LoaderConfig;
use crate::locator::Located;
use crate::paths::{normalize_lexically, path_to_url, url_to_path};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Descriptor of one resolved package as seen from the project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSpec {
    /// Entry file relative to the package root, when the package was
    /// requested by its own name.
    pub entry_path: Option<String>,
    /// URL-style package root relative to the base directory.
    pub root_path: String,
    /// Absolute package root. Never serialized.
    pub full_root_path: PathBuf,
    /// Package-relative path fixes, `./`-prefixed.
    pub fix_tbl: BTreeMap<String, String>,
}

impl PackageSpec {
    /// Fold another descriptor of the same package into this one.
    pub fn merge(&mut self, other: &PackageSpec) {
        if self.entry_path.is_none() {
            self.entry_path.clone_from(&other.entry_path);
        }
        self.fix_tbl
            .extend(other.fix_tbl.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Repo root → package name → descriptor.
pub type RepoTable = BTreeMap<String, BTreeMap<String, PackageSpec>>;

/// Absolute URL-style path → absolute URL-style corrected path.
pub type FixTable = BTreeMap<String, String>;

/// Fix and repo tables for one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    repos: RepoTable,
    fixes: FixTable,
    unnamed: BTreeMap<String, PackageSpec>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn repos(&self) -> &RepoTable {
        &self.repos
    }

    #[must_use]
    pub fn fixes(&self) -> &FixTable {
        &self.fixes
    }

    /// Packages without a name, keyed by root path.
    #[must_use]
    pub fn unnamed(&self) -> &BTreeMap<String, PackageSpec> {
        &self.unnamed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty() && self.fixes.is_empty() && self.unnamed.is_empty()
    }

    /// Find a package descriptor by name in any repo.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&PackageSpec> {
        self.repos.values().find_map(|packages| packages.get(name))
    }

    /// Iterate over every `(repo, name, spec)` triple in key order.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &str, &PackageSpec)> {
        self.repos.iter().flat_map(|(repo, packages)| {
            packages
                .iter()
                .map(move |(name, spec)| (repo.as_str(), name.as_str(), spec))
        })
    }

    /// Record that `from` had to be corrected to `to`.
    ///
    /// A later fix for the same path replaces the earlier one.
    pub fn record_fix(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let (from, to) = (from.into(), to.into());
        if from == to {
            return;
        }

        if let Some(previous) = self.fixes.get(&from) {
            if *previous != to {
                tracing::debug!(%from, %previous, %to, "fix table entry replaced");
            }
        }
        self.fixes.insert(from, to);
    }

    /// Register a package under the repo root derived from its root path.
    pub fn insert_package(&mut self, name: impl Into<String>, spec: PackageSpec) {
        let name = name.into();
        let repo = repo_root(&spec.root_path);
        let packages = self.repos.entry(repo).or_default();

        match packages.get_mut(&name) {
            Some(existing) => existing.merge(&spec),
            None => {
                packages.insert(name, spec);
            }
        }
    }

    /// Apply a locator result. Internal modules leave no trace.
    pub fn record(&mut self, located: &Located) {
        match located {
            Located::Internal => {}
            Located::Package { name, spec, .. } => self.insert_package(name.clone(), spec.clone()),
            Located::Relative { from, to, .. } => self.record_fix(from.clone(), to.clone()),
        }
    }

    /// Seed the ledger from a loader configuration, e.g. one generated by
    /// an earlier run, so regenerating it yields an equivalent document.
    pub fn absorb(&mut self, config: &LoaderConfig, base: &Path) {
        let full_root = |root: &str| normalize_lexically(&base.join(url_to_path(root)));

        for (name, root) in &config.map {
            let root_path = root.trim_end_matches('/').to_string();
            let entry_path = config
                .packages
                .get(&root_path)
                .and_then(|package| package.main.clone());

            self.insert_package(
                name.clone(),
                PackageSpec {
                    entry_path,
                    full_root_path: full_root(&root_path),
                    root_path,
                    fix_tbl: BTreeMap::new(),
                },
            );
        }

        for (root, package) in &config.packages {
            let mapped = config
                .map
                .values()
                .any(|target| target.trim_end_matches('/') == root);
            if !mapped && package.main.is_some() {
                self.unnamed
                    .entry(root.clone())
                    .or_insert_with(|| PackageSpec {
                        entry_path: None,
                        root_path: root.clone(),
                        full_root_path: full_root(root),
                        fix_tbl: BTreeMap::new(),
                    })
                    .entry_path
                    .clone_from(&package.main);
            }

            let root_dir = base.join(url_to_path(root));
            for (from, to) in &package.map {
                self.record_fix(
                    path_to_url(&normalize_lexically(&root_dir.join(url_to_path(from)))),
                    path_to_url(&normalize_lexically(&root_dir.join(url_to_path(to)))),
                );
            }
        }
    }
}

/// Repo root of a package root path: everything up to and including the
/// first `node_modules` segment, or the root path itself when there is none.
#[must_use]
pub fn repo_root(root_path: &str) -> String {
    let segments: Vec<&str> = root_path.split('/').collect();

    match segments.iter().position(|s| *s == "node_modules") {
        Some(i) => segments[..=i].join("/"),
        None => root_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader_config::PackageConfig;

    fn spec(root: &str, entry: Option<&str>) -> PackageSpec {
        PackageSpec {
            entry_path: entry.map(str::to_string),
            root_path: root.to_string(),
            full_root_path: PathBuf::from("/p").join(root),
            fix_tbl: BTreeMap::new(),
        }
    }

    #[test]
    fn test_repo_root() {
        assert_eq!(repo_root("node_modules/leftpad"), "node_modules");
        assert_eq!(repo_root("node_modules/a/node_modules/b"), "node_modules");
        assert_eq!(repo_root("vendor/node_modules/@s/x"), "vendor/node_modules");
        assert_eq!(repo_root("lib/local"), "lib/local");
    }

    #[test]
    fn test_insert_package_keyed_by_repo() {
        let mut ledger = Ledger::new();
        ledger.insert_package("leftpad", spec("node_modules/leftpad", Some("index.js")));

        let packages = &ledger.repos()["node_modules"];
        assert_eq!(
            packages["leftpad"].entry_path.as_deref(),
            Some("index.js")
        );
    }

    #[test]
    fn test_entry_path_gained_later() {
        let mut ledger = Ledger::new();
        ledger.insert_package("lodash", spec("node_modules/lodash", None));
        ledger.insert_package("lodash", spec("node_modules/lodash", Some("lodash.js")));
        ledger.insert_package("lodash", spec("node_modules/lodash", None));

        assert_eq!(ledger.repos()["node_modules"].len(), 1);
        assert_eq!(
            ledger.package("lodash").unwrap().entry_path.as_deref(),
            Some("lodash.js")
        );
    }

    #[test]
    fn test_record_fix_last_write_wins() {
        let mut ledger = Ledger::new();
        ledger.record_fix("/p/a", "/p/a/index.js");
        ledger.record_fix("/p/a", "/p/a.json");
        ledger.record_fix("/p/same", "/p/same");

        assert_eq!(ledger.fixes().len(), 1);
        assert_eq!(ledger.fixes()["/p/a"], "/p/a.json");
    }

    #[test]
    fn test_record_internal_is_noop() {
        let mut ledger = Ledger::new();
        ledger.record(&Located::Internal);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_absorb_config() {
        let mut config = LoaderConfig::default();
        config
            .map
            .insert("leftpad".to_string(), "node_modules/leftpad".to_string());
        config.packages.insert(
            "node_modules/leftpad".to_string(),
            PackageConfig {
                main: Some("index.js".to_string()),
                map: BTreeMap::from([("./lib.js".to_string(), "./lib/index.js".to_string())]),
            },
        );

        let mut ledger = Ledger::new();
        ledger.absorb(&config, Path::new("/p"));

        let leftpad = ledger.package("leftpad").unwrap();
        assert_eq!(leftpad.entry_path.as_deref(), Some("index.js"));
        assert_eq!(leftpad.full_root_path, PathBuf::from("/p/node_modules/leftpad"));
        assert_eq!(
            ledger.fixes()["/p/node_modules/leftpad/lib.js"],
            "/p/node_modules/leftpad/lib/index.js"
        );
    }

    #[test]
    fn test_absorb_keeps_unmapped_package_main() {
        let mut config = LoaderConfig::default();
        config.packages.insert(
            "lib/widgets".to_string(),
            PackageConfig {
                main: Some("widgets.js".to_string()),
                map: BTreeMap::new(),
            },
        );
        config.packages.insert(
            "lib/plain".to_string(),
            PackageConfig {
                main: None,
                map: BTreeMap::from([("./a.js".to_string(), "./a/index.js".to_string())]),
            },
        );

        let mut ledger = Ledger::new();
        ledger.absorb(&config, Path::new("/p"));

        assert!(ledger.repos().is_empty());
        assert_eq!(ledger.unnamed().len(), 1);
        let widgets = &ledger.unnamed()["lib/widgets"];
        assert_eq!(widgets.entry_path.as_deref(), Some("widgets.js"));
        assert_eq!(widgets.full_root_path, PathBuf::from("/p/lib/widgets"));
        assert_eq!(ledger.fixes()["/p/lib/plain/a.js"], "/p/lib/plain/a/index.js");
    }
}
