use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default name of the preexisting loader configuration inside the base
/// directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.js";

/// Default module id of the runtime shim injected as the `process` global.
pub const DEFAULT_SHIM_MODULE: &str = "process";

/// Options for one build run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory holding `package.json` and the loader configuration.
    pub base: PathBuf,

    /// Entry source. Defaults to the project manifest's entry.
    pub source: Option<PathBuf>,

    /// Where to write the bundle.
    pub bundle_out: Option<PathBuf>,

    /// Where to write the generated loader configuration.
    pub config_out: Option<PathBuf>,

    /// Preexisting loader configuration, relative to `base`.
    pub config_file: String,

    /// Files prepended verbatim to the generated configuration.
    pub include_configs: Vec<PathBuf>,

    /// Packages to map even when the bundle does not import them.
    pub map_packages: Vec<String>,

    /// Development build.
    pub debug: bool,

    /// Self-executing bundle.
    pub sfx: bool,

    /// Module id bound to the `process` global of installed packages.
    pub shim_module: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            source: None,
            bundle_out: None,
            config_out: None,
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            include_configs: Vec::new(),
            map_packages: Vec::new(),
            debug: false,
            sfx: false,
            shim_module: DEFAULT_SHIM_MODULE.to_string(),
        }
    }
}

impl BuildConfig {
    /// Create a config for the project in `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_bundle_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.bundle_out = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_config_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_out = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    /// Add a file to prepend to the generated configuration.
    #[must_use]
    pub fn with_include_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_configs.push(path.into());
        self
    }

    /// Add a package to map regardless of imports.
    #[must_use]
    pub fn with_map_package(mut self, name: impl Into<String>) -> Self {
        self.map_packages.push(name.into());
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_sfx(mut self, sfx: bool) -> Self {
        self.sfx = sfx;
        self
    }

    #[must_use]
    pub fn with_shim_module(mut self, module: impl Into<String>) -> Self {
        self.shim_module = module.into();
        self
    }

    /// `NODE_ENV` value the bundle is built for.
    #[must_use]
    pub fn node_env(&self) -> &'static str {
        if self.debug {
            "development"
        } else {
            "production"
        }
    }
}
