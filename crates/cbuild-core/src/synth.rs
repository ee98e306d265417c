//! Loader configuration synthesis.
//!
//! Turns the ledger of a finished build into a configuration document with
//! three sections:
//! - `map`: package name → root path
//! - `meta`: a runtime shim global injected into every file under each
//!   `node_modules` repo root
//! - `packages`: per-package entry file and path fixes
//!
//! Fixes are recorded as absolute paths during resolution. Here each one is
//! attributed to the package that contains it, using a [`PackageTree`] built
//! from all known package roots, and re-expressed relative to that package.

use crate::error::Result;
use crate::ledger::{Ledger, PackageSpec};
use crate::loader_config::{LoaderConfig, MetaConfig, PackageConfig};
use crate::package_tree::PackageTree;
use crate::paths::{normalize_lexically, relative_url, url_to_path};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options for [`synthesize`].
#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// Global name provided by the runtime shim.
    pub shim_global: String,
    /// Module id the shim global is loaded from.
    pub shim_module: String,
    /// Documents copied verbatim ahead of the generated configuration.
    pub prologue: Vec<String>,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            shim_global: "process".to_string(),
            shim_module: "process".to_string(),
            prologue: Vec::new(),
        }
    }
}

/// A package after fix attribution. Synthetic packages have no name.
#[derive(Debug, Clone)]
struct Attributed {
    name: Option<String>,
    spec: PackageSpec,
}

/// Render the ledger as a loader configuration document.
///
/// The output depends only on the ledger contents, `base` and `options`.
pub fn synthesize(ledger: &Ledger, base: &Path, options: &SynthOptions) -> Result<String> {
    let mut document = String::new();

    for part in &options.prologue {
        document.push_str(part.trim_end());
        document.push('\n');
    }

    document.push_str(&loader_config(ledger, base, options).render()?);
    Ok(document)
}

/// Build the configuration object for a ledger.
#[must_use]
pub fn loader_config(ledger: &Ledger, base: &Path, options: &SynthOptions) -> LoaderConfig {
    let packages = attribute_fixes(ledger, base);
    let mut config = LoaderConfig::default();

    // Shallowest root wins when a name is installed more than once.
    let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
    for (root, package) in &packages {
        let Some(name) = package.name.as_deref() else {
            continue;
        };
        let segments = root.split('/').count();
        if depth.get(name).map_or(true, |&d| segments < d) {
            depth.insert(name, segments);
            config.map.insert(name.to_string(), root.clone());
        }
    }

    for repo in ledger.repos().keys() {
        if repo.rsplit('/').next() != Some("node_modules") {
            continue;
        }
        config.meta.insert(
            format!("{repo}/*"),
            MetaConfig {
                globals: BTreeMap::from([(
                    options.shim_global.clone(),
                    options.shim_module.clone(),
                )]),
            },
        );
    }

    for (root, package) in packages {
        if package.spec.entry_path.is_none() && package.spec.fix_tbl.is_empty() {
            continue;
        }
        config.packages.insert(
            root,
            PackageConfig {
                main: package.spec.entry_path,
                map: package.spec.fix_tbl,
            },
        );
    }

    config
}

/// Group every fix under the package owning it, keyed by package root.
fn attribute_fixes(ledger: &Ledger, base: &Path) -> BTreeMap<String, Attributed> {
    let mut packages: BTreeMap<String, Attributed> = BTreeMap::new();
    let mut tree = PackageTree::new();

    for (_, name, spec) in ledger.packages() {
        if spec.root_path.is_empty() {
            continue;
        }
        tree.insert(&spec.root_path, name);
        packages
            .entry(spec.root_path.clone())
            .and_modify(|existing| existing.spec.merge(spec))
            .or_insert_with(|| Attributed {
                name: Some(name.to_string()),
                spec: spec.clone(),
            });
    }

    // Unnamed packages stay out of the tree so fix attribution is unchanged.
    for (root, spec) in ledger.unnamed() {
        packages
            .entry(root.clone())
            .and_modify(|existing| existing.spec.merge(spec))
            .or_insert_with(|| Attributed {
                name: None,
                spec: spec.clone(),
            });
    }

    for (from, to) in ledger.fixes() {
        let from_path = normalize_lexically(&url_to_path(from));
        let to_path = normalize_lexically(&url_to_path(to));
        let rel_from = relative_url(&from_path, base);

        let root = match tree.owner(&rel_from) {
            Some(owner) => owner.root,
            None => synthetic_root(&rel_from),
        };

        let package = packages.entry(root.clone()).or_insert_with(|| {
            tracing::debug!(%root, "fix outside known packages, adding synthetic package");
            Attributed {
                name: None,
                spec: PackageSpec {
                    entry_path: None,
                    full_root_path: normalize_lexically(&base.join(url_to_path(&root))),
                    root_path: root.clone(),
                    fix_tbl: BTreeMap::new(),
                },
            }
        });

        let root_dir: PathBuf = package.spec.full_root_path.clone();
        package.spec.fix_tbl.insert(
            package_relative(&from_path, &root_dir),
            package_relative(&to_path, &root_dir),
        );
    }

    packages
}

/// Containing directory of a base-relative path, `.` for the base itself.
fn synthetic_root(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ".".to_string(),
    }
}

fn package_relative(path: &Path, root: &Path) -> String {
    let rel = relative_url(path, root);
    if rel.starts_with("../") {
        rel
    } else {
        format!("./{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::path_to_url;

    fn base() -> PathBuf {
        PathBuf::from("/p")
    }

    fn abs(rel: &str) -> String {
        path_to_url(&base().join(rel))
    }

    fn package(root: &str, entry: Option<&str>) -> PackageSpec {
        PackageSpec {
            entry_path: entry.map(str::to_string),
            root_path: root.to_string(),
            full_root_path: base().join(root),
            fix_tbl: BTreeMap::new(),
        }
    }

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.insert_package("leftpad", package("node_modules/leftpad", Some("index.js")));
        ledger.insert_package("lodash", package("node_modules/lodash", None));
        ledger.record_fix(abs("src/foo.js"), abs("src/foo/index.js"));
        ledger.record_fix(
            abs("node_modules/lodash/fp.js"),
            abs("node_modules/lodash/fp/index.js"),
        );
        ledger
    }

    #[test]
    fn test_deterministic_output() {
        let ledger = sample_ledger();
        let options = SynthOptions::default();

        let first = synthesize(&ledger, &base(), &options).unwrap();
        let second = synthesize(&ledger, &base(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sections() {
        let config = loader_config(&sample_ledger(), &base(), &SynthOptions::default());

        assert_eq!(config.map["leftpad"], "node_modules/leftpad");
        assert_eq!(config.map["lodash"], "node_modules/lodash");
        assert_eq!(config.map.len(), 2);

        assert_eq!(config.meta["node_modules/*"].globals["process"], "process");

        assert_eq!(
            config.packages["node_modules/leftpad"].main.as_deref(),
            Some("index.js")
        );
        assert_eq!(
            config.packages["node_modules/lodash"].map["./fp.js"],
            "./fp/index.js"
        );
        assert_eq!(config.packages["src"].map["./foo.js"], "./foo/index.js");
    }

    #[test]
    fn test_package_without_overrides_omitted() {
        let mut ledger = Ledger::new();
        ledger.insert_package("lodash", package("node_modules/lodash", None));

        let text = synthesize(&ledger, &base(), &SynthOptions::default()).unwrap();
        assert!(text.contains("\"map\""));
        assert!(!text.contains("\"packages\""));
    }

    #[test]
    fn test_empty_ledger_renders_only_prologue() {
        let options = SynthOptions {
            prologue: vec!["System.config({\"map\": {\"x\": \"y\"}});\n\n".to_string()],
            ..SynthOptions::default()
        };

        let text = synthesize(&Ledger::new(), &base(), &options).unwrap();
        assert_eq!(text, "System.config({\"map\": {\"x\": \"y\"}});\n");
    }

    #[test]
    fn test_prologue_comes_first() {
        let options = SynthOptions {
            prologue: vec!["// first".to_string(), "// second".to_string()],
            ..SynthOptions::default()
        };

        let text = synthesize(&sample_ledger(), &base(), &options).unwrap();
        assert!(text.starts_with("// first\n// second\nSystem.config({"));
    }

    #[test]
    fn test_fix_attributed_to_nested_package() {
        let mut ledger = Ledger::new();
        ledger.insert_package("a", package("node_modules/a", None));
        ledger.insert_package("b", package("node_modules/a/node_modules/b", None));
        ledger.record_fix(
            abs("node_modules/a/node_modules/b/util.js"),
            abs("node_modules/a/node_modules/b/util/index.js"),
        );

        let config = loader_config(&ledger, &base(), &SynthOptions::default());
        assert_eq!(
            config.packages["node_modules/a/node_modules/b"].map["./util.js"],
            "./util/index.js"
        );
        assert!(!config.packages.contains_key("node_modules/a"));
    }

    #[test]
    fn test_one_synthetic_package_per_directory() {
        let mut ledger = Ledger::new();
        ledger.record_fix(abs("lib/a.js"), abs("lib/a/index.js"));
        ledger.record_fix(abs("lib/b.js"), abs("lib/b/index.js"));

        let config = loader_config(&ledger, &base(), &SynthOptions::default());
        assert_eq!(config.packages.len(), 1);
        assert_eq!(config.packages["lib"].map.len(), 2);
        assert!(config.map.is_empty());
    }

    #[test]
    fn test_fix_in_base_directory() {
        let mut ledger = Ledger::new();
        ledger.record_fix(abs("app.js"), abs("app/index.js"));

        let config = loader_config(&ledger, &base(), &SynthOptions::default());
        assert_eq!(config.packages["."].map["./app.js"], "./app/index.js");
    }

    #[test]
    fn test_round_trip_through_absorb() {
        let options = SynthOptions::default();
        let first = synthesize(&sample_ledger(), &base(), &options).unwrap();

        let parsed = LoaderConfig::parse(&first, "generated").unwrap();
        let mut reloaded = Ledger::new();
        reloaded.absorb(&parsed, &base());

        let second = synthesize(&reloaded, &base(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unnamed_package_main_survives_round_trip() {
        let text = r#"System.config({
  "packages": {
    "lib/widgets": { "main": "widgets.js", "map": { "./a.js": "./a/index.js" } },
    "src": { "main": "boot.js" }
  }
});
"#;
        let options = SynthOptions::default();

        let mut ledger = Ledger::new();
        ledger.absorb(&LoaderConfig::parse(text, "config.js").unwrap(), &base());
        let first = synthesize(&ledger, &base(), &options).unwrap();

        let config = LoaderConfig::parse(&first, "generated").unwrap();
        assert!(config.map.is_empty());
        assert_eq!(
            config.packages["lib/widgets"].main.as_deref(),
            Some("widgets.js")
        );
        assert_eq!(config.packages["lib/widgets"].map["./a.js"], "./a/index.js");
        assert_eq!(config.packages["src"].main.as_deref(), Some("boot.js"));

        let mut reloaded = Ledger::new();
        reloaded.absorb(&config, &base());
        assert_eq!(synthesize(&reloaded, &base(), &options).unwrap(), first);
    }
}
