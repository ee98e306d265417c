//! A small SystemJS-style bundling engine.
//!
//! Normalization follows the loader configuration: `map` for bare names,
//! package `main` and `map` overrides, then the default `.js` extension.
//! Bare names without a mapping resolve against the base directory, the
//! way a loader resolves them against its base URL.

use super::scan::scan_specifiers;
use super::{BuildResult, BundleEngine, BundleOptions, Normalize, TreeItem, EMPTY_MODULE};
use crate::error::{Error, Result};
use crate::loader_config::LoaderConfig;
use crate::locator::parse_bare_specifier;
use crate::paths::{
    address_to_path, normalize_lexically, path_to_url, relative_url, url_to_path,
    with_default_extension,
};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Engine over the filesystem below a base directory.
#[derive(Debug, Clone)]
pub struct GraphEngine {
    base: PathBuf,
    config: LoaderConfig,
    virtual_modules: BTreeMap<String, String>,
}

impl GraphEngine {
    /// Create an engine with an empty configuration.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            config: LoaderConfig::default(),
            virtual_modules: BTreeMap::new(),
        }
    }

    /// Create an engine and load `config_file` (relative to `base`) if present.
    pub fn load(base: impl Into<PathBuf>, config_file: &str) -> Result<Self> {
        let engine = Self::new(base);
        let config = LoaderConfig::load(&engine.base.join(config_file))?;
        Ok(engine.with_config(config))
    }

    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Register content produced without a file, keyed by base-relative
    /// module name (e.g. `generated/version.js`).
    #[must_use]
    pub fn with_virtual(mut self, name: impl Into<String>, code: impl Into<String>) -> Self {
        self.virtual_modules.insert(name.into(), code.into());
        self
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Module name of an address: base-relative when below the base.
    #[must_use]
    pub fn module_name(&self, address: &str) -> String {
        if address == EMPTY_MODULE {
            return EMPTY_MODULE.to_string();
        }

        let path = address_to_path(address, &self.base);
        let rel = relative_url(&path, &self.base);
        if rel.starts_with("..") {
            path_to_url(&path)
        } else {
            rel
        }
    }

    /// Base-relative path a bare specifier maps to.
    fn map_bare(&self, specifier: &str) -> String {
        if let Some(target) = self.config.map.get(specifier) {
            return target.clone();
        }

        let (name, subpath) = parse_bare_specifier(specifier);
        match (self.config.map.get(name), subpath) {
            (Some(root), Some(sub)) => format!("{}/{sub}", root.trim_end_matches('/')),
            _ => specifier.to_string(),
        }
    }

    /// Apply package `main`/`map` overrides and the default extension.
    fn apply_packages(&self, path: &Path) -> PathBuf {
        let rel = relative_url(path, &self.base);

        for (root, package) in &self.config.packages {
            let root_dir = if root == "." {
                self.base.clone()
            } else {
                self.base.join(url_to_path(root))
            };

            if rel == *root || (root == "." && rel.is_empty()) {
                if let Some(main) = &package.main {
                    return normalize_lexically(&root_dir.join(url_to_path(main)));
                }
                continue;
            }

            let inside = if root == "." {
                Some(rel.as_str())
            } else {
                rel.strip_prefix(root.as_str())
                    .and_then(|r| r.strip_prefix('/'))
            };
            let Some(sub) = inside else {
                continue;
            };

            let with_ext = with_default_extension(sub);
            for key in [format!("./{with_ext}"), format!("./{sub}")] {
                if let Some(target) = package.map.get(&key) {
                    return normalize_lexically(&root_dir.join(url_to_path(target)));
                }
            }
        }

        PathBuf::from(with_default_extension(&path.to_string_lossy()))
    }

    fn emit(&self, order: &[(String, String)], result: &BuildResult, entry: &str, sfx: bool) -> String {
        let mut out = String::new();

        if sfx {
            out.push_str(SFX_PRELUDE);
        }

        for (name, source) in order {
            let item = &result.tree[name];
            let name_json = json_string(name);

            if sfx {
                let map = serde_json::to_string(&item.dep_map).unwrap_or_else(|_| "{}".to_string());
                out.push_str(&format!(
                    "defs[{name_json}] = {{ map: {map}, factory: function(require, exports, module) {{\n{source}\n}} }};\n"
                ));
            } else {
                let deps = serde_json::to_string(&item.deps).unwrap_or_else(|_| "[]".to_string());
                out.push_str(&format!(
                    "System.registerDynamic({name_json}, {deps}, true, function(require, exports, module) {{\n{source}\n}});\n"
                ));
            }
        }

        if sfx {
            out.push_str(&format!("load({});\n}})();\n", json_string(entry)));
        }

        out
    }
}

const SFX_PRELUDE: &str = "(function() {
var defs = {}, cache = {};
function load(name) {
  if (cache[name]) return cache[name].exports;
  var def = defs[name], module = cache[name] = { exports: {} };
  if (def) def.factory(function(spec) { return load(def.map[spec]); }, module.exports, module);
  return module.exports;
}
";

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl BundleEngine for GraphEngine {
    async fn normalize(
        &self,
        specifier: &str,
        _parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String> {
        if specifier == EMPTY_MODULE {
            return Ok(EMPTY_MODULE.to_string());
        }

        let path = if specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == ".."
        {
            let parent_dir = parent_address
                .filter(|a| *a != EMPTY_MODULE)
                .map(|a| address_to_path(a, &self.base))
                .and_then(|p| p.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| self.base.clone());
            normalize_lexically(&parent_dir.join(specifier))
        } else if specifier.starts_with('/') || specifier.starts_with("file:") {
            address_to_path(specifier, &self.base)
        } else {
            address_to_path(&self.map_bare(specifier), &self.base)
        };

        Ok(path_to_url(&self.apply_packages(&path)))
    }

    async fn fetch(&self, address: &str) -> Result<Option<String>> {
        if address == EMPTY_MODULE {
            return Ok(Some(String::new()));
        }

        if let Some(code) = self.virtual_modules.get(&self.module_name(address)) {
            return Ok(Some(code.clone()));
        }

        let path = address_to_path(address, &self.base);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(tokio::fs::read_to_string(&path).await?)),
            _ => Ok(None),
        }
    }

    async fn bundle<H: Normalize>(
        &self,
        entry: &str,
        hook: &mut H,
        options: &BundleOptions,
    ) -> Result<BuildResult> {
        let mut result = BuildResult::default();
        let mut order: Vec<(String, String)> = Vec::new();

        let entry_address = hook.normalize(entry, None, None).await?;
        if entry_address == EMPTY_MODULE {
            return Err(Error::engine(format!("entry '{entry}' resolved to an empty module")));
        }
        let entry_name = self.module_name(&entry_address);
        result.entry_points = Some(vec![entry_name.clone()]);

        let mut seen: HashSet<String> = HashSet::from([entry_name.clone()]);
        let mut queue: VecDeque<(String, PathBuf)> =
            VecDeque::from([(entry_address, self.base.clone())]);

        while let Some((address, importer)) = queue.pop_front() {
            let name = self.module_name(&address);
            tracing::trace!(%name, %address, "loading module");

            let source = self.fetch(&address).await?.ok_or_else(|| Error::NotFound {
                specifier: name.clone(),
                importer: importer.clone(),
            })?;
            let source = source.replace(
                "process.env.NODE_ENV",
                &json_string(options.node_env()),
            );

            let mut item = TreeItem {
                address: address.clone(),
                ..TreeItem::default()
            };

            for specifier in scan_specifiers(&source) {
                let dep_address = hook
                    .normalize(&specifier, Some(&name), Some(&address))
                    .await?;
                let dep_name = self.module_name(&dep_address);

                item.deps.push(specifier.clone());
                item.dep_map.insert(specifier, dep_name.clone());

                if seen.insert(dep_name) {
                    queue.push_back((dep_address, address_to_path(&address, &self.base)));
                }
            }

            result.tree.insert(name.clone(), item);
            order.push((name, source));
        }

        result.source = self.emit(&order, &result, &entry_name, options.sfx);
        tracing::debug!(modules = result.tree.len(), "bundle complete");
        Ok(result)
    }
}

/// The engine resolves specifiers by itself when no hook is attached.
pub struct Baseline<'a>(pub &'a GraphEngine);

impl Normalize for Baseline<'_> {
    async fn normalize(
        &mut self,
        specifier: &str,
        parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String> {
        BundleEngine::normalize(self.0, specifier, parent_name, parent_address).await
    }
}
