//! Package-manager style resolution of module specifiers.
//!
//! Supports:
//! - Relative and absolute specifiers with extension probing
//! - Directory resolution (`package.json` entry, then `index.*`)
//! - Bare specifiers via ancestor `node_modules` lookup, scoped names included
//! - The `browser` field: string entry override and replacement maps
//! - Node built-ins that no installed package shadows
//!
//! Besides the resolved file, the locator reports which package manifest
//! was consulted last, so the caller can record the package root.

use crate::error::{Error, Result};
use crate::ledger::PackageSpec;
use crate::manifest::{self, PackageManifest, Replacement, MANIFEST_FILE};
use crate::paths::{normalize_lexically, path_to_url, relative_url, with_default_extension};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Extensions probed after the exact path, in order.
pub const EXTENSIONS: &[&str] = &["js", "json"];

/// Entry used when a package manifest declares none.
const DEFAULT_ENTRY: &str = "index.js";

/// Node core modules.
const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// What a specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Host built-in or disabled module: resolved, but nothing to bundle.
    Internal,
    /// A file owned by an installed package.
    Package {
        /// Declared name of the consulted package.
        name: String,
        spec: PackageSpec,
        resolved: PathBuf,
    },
    /// A relative or absolute specifier; `from` is the path the specifier
    /// names and `to` the file it actually resolved to, both URL-style.
    Relative {
        from: String,
        to: String,
        resolved: PathBuf,
    },
}

impl Located {
    /// Resolved file as a URL-style path relative to `base`.
    /// `None` for internal modules.
    #[must_use]
    pub fn resolved_url(&self, base: &Path) -> Option<String> {
        match self {
            Self::Internal => None,
            Self::Package { resolved, .. } | Self::Relative { resolved, .. } => {
                Some(relative_url(resolved, base))
            }
        }
    }
}

/// Resolve `specifier` as imported from the file `importer`.
///
/// Root paths in the returned [`PackageSpec`] are relative to `base`.
pub fn locate(specifier: &str, importer: &Path, base: &Path) -> Result<Located> {
    let importer_dir = importer.parent().unwrap_or(base);

    if is_path_specifier(specifier) {
        return locate_path(specifier, importer, importer_dir);
    }

    if specifier.starts_with("node:") {
        return Ok(Located::Internal);
    }

    // The importing package may replace or disable bare names.
    if let Some(owner) = manifest::find_owner(importer_dir) {
        match owner.manifest.replacement(specifier) {
            Some(Replacement::Empty) => return Ok(Located::Internal),
            // Replacements apply once; the target is resolved as written.
            Some(Replacement::Path(target)) if target != specifier => {
                return if is_path_specifier(&target) {
                    locate_path(&target, &owner.root.join(MANIFEST_FILE), &owner.root)
                } else {
                    locate_bare(&target, importer, importer_dir, base)
                };
            }
            _ => {}
        }
    }

    locate_bare(specifier, importer, importer_dir, base)
}

fn locate_path(specifier: &str, importer: &Path, importer_dir: &Path) -> Result<Located> {
    let target = normalize_lexically(&importer_dir.join(specifier));
    let file = resolve_file_or_directory(&target).ok_or_else(|| not_found(specifier, importer))?;

    let owner = file.parent().and_then(manifest::find_owner);
    let file = match owner {
        Some(owner) => match browser_replacement(&owner.manifest, &owner.root, &file) {
            Some(Replacement::Empty) => return Ok(Located::Internal),
            Some(Replacement::Path(replaced)) => owner.root.join(replaced),
            None => file,
        },
        None => file,
    };
    let file = normalize_lexically(&file);

    Ok(Located::Relative {
        from: path_to_url(&target),
        to: path_to_url(&file),
        resolved: file,
    })
}

fn locate_bare(
    specifier: &str,
    importer: &Path,
    importer_dir: &Path,
    base: &Path,
) -> Result<Located> {
    let (pkg_name, subpath) = parse_bare_specifier(specifier);

    let Some(pkg_dir) = find_package_dir(importer_dir, pkg_name) else {
        if is_builtin(specifier) {
            return Ok(Located::Internal);
        }
        return Err(not_found(specifier, importer));
    };

    let manifest_path = pkg_dir.join(MANIFEST_FILE);
    let manifest = if manifest_path.is_file() {
        manifest::read_manifest(&manifest_path)?
    } else {
        PackageManifest::default()
    };

    let file = match subpath {
        Some(sub) => resolve_file_or_directory(&normalize_lexically(&pkg_dir.join(sub))),
        None => {
            let entry = manifest.entry().unwrap_or(DEFAULT_ENTRY);
            resolve_file_or_directory(&normalize_lexically(&pkg_dir.join(entry)))
                .or_else(|| resolve_index(&pkg_dir))
        }
    }
    .ok_or_else(|| not_found(specifier, importer))?;

    let file = match browser_replacement(&manifest, &pkg_dir, &file) {
        Some(Replacement::Empty) => return Ok(Located::Internal),
        Some(Replacement::Path(replaced)) => normalize_lexically(&pkg_dir.join(replaced)),
        None => file,
    };

    let name = manifest.name.clone().unwrap_or_else(|| pkg_name.to_string());
    let entry_path = (name == specifier).then(|| relative_url(&file, &pkg_dir));

    // The loader asks for `<sub>.js`; anything else needs a package-local fix.
    let mut fix_tbl = BTreeMap::new();
    if let Some(sub) = subpath {
        let requested = with_default_extension(&relative_url(&pkg_dir.join(sub), &pkg_dir));
        let actual = relative_url(&file, &pkg_dir);
        let inside = |rel: &str| !rel.is_empty() && !rel.starts_with("..");
        if requested != actual && inside(&requested) && inside(&actual) {
            fix_tbl.insert(format!("./{requested}"), format!("./{actual}"));
        }
    }

    Ok(Located::Package {
        spec: PackageSpec {
            entry_path,
            root_path: relative_url(&pkg_dir, base),
            full_root_path: pkg_dir,
            fix_tbl,
        },
        name,
        resolved: file,
    })
}

/// Whether a specifier names a path rather than a package.
#[must_use]
pub fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with('.') || Path::new(specifier).is_absolute()
}

/// Whether a bare specifier names a Node core module.
#[must_use]
pub fn is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    let base = name.split('/').next().unwrap_or(name);
    NODE_BUILTINS.contains(&base)
}

/// Split a bare specifier into package name and optional subpath.
///
/// `lodash/fp` gives `("lodash", Some("fp"))`, `@scope/pkg/sub` gives
/// `("@scope/pkg", Some("sub"))`.
#[must_use]
pub fn parse_bare_specifier(spec: &str) -> (&str, Option<&str>) {
    let name_end = if spec.starts_with('@') {
        spec.match_indices('/').nth(1).map(|(i, _)| i)
    } else {
        spec.find('/')
    };

    match name_end {
        Some(i) => (&spec[..i], Some(&spec[i + 1..]).filter(|s| !s.is_empty())),
        None => (spec, None),
    }
}

/// Find `node_modules/<name>` in `dir` or its ancestors.
fn find_package_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    dir.ancestors()
        .filter(|d| d.file_name().map_or(true, |n| n != "node_modules"))
        .map(|d| d.join("node_modules").join(name))
        .find(|candidate| candidate.is_dir())
}

fn browser_replacement(
    manifest: &PackageManifest,
    root: &Path,
    file: &Path,
) -> Option<Replacement> {
    let rel = relative_url(file, root);
    if rel.starts_with("..") {
        return None;
    }
    manifest.replacement(&rel)
}

/// Resolve a path to a file: exact, with probed extensions, or as a directory.
fn resolve_file_or_directory(target: &Path) -> Option<PathBuf> {
    if let Some(file) = resolve_file(target) {
        return Some(file);
    }

    if !target.is_dir() {
        return None;
    }

    let manifest_path = target.join(MANIFEST_FILE);
    if manifest_path.is_file() {
        let entry = manifest::read_manifest(&manifest_path)
            .ok()
            .and_then(|m| m.entry().map(str::to_string));
        if let Some(entry) = entry {
            if let Some(file) = resolve_file(&normalize_lexically(&target.join(entry))) {
                return Some(file);
            }
        }
    }

    resolve_index(target)
}

fn resolve_file(target: &Path) -> Option<PathBuf> {
    if target.is_file() {
        return Some(target.to_path_buf());
    }

    EXTENSIONS
        .iter()
        .map(|ext| with_appended_extension(target, ext))
        .find(|candidate| candidate.is_file())
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

fn not_found(specifier: &str, importer: &Path) -> Error {
    Error::NotFound {
        specifier: specifier.to_string(),
        importer: importer.to_path_buf(),
    }
}
