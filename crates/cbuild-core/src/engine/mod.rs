//! The seam between cbuild and the bundling engine.
//!
//! The engine parses sources, walks imports and emits the bundle. cbuild
//! only needs three things from it:
//! - its baseline specifier normalizer
//! - a way to force-load an address so content-producing plugins run
//! - a bundling pass that calls back into a [`Normalize`] hook for every
//!   specifier it meets
//!
//! [`GraphEngine`] is a small SystemJS-style engine implementing the trait.

mod graph;
mod scan;

pub use graph::{Baseline, GraphEngine};
pub use scan::scan_specifiers;

use crate::error::Result;
use std::collections::BTreeMap;

/// Address of the module with no content, used for built-ins.
pub const EMPTY_MODULE: &str = "@empty";

/// One module of the engine's result graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeItem {
    /// Address the module was loaded from.
    pub address: String,
    /// Specifiers imported by the module, in source order.
    pub deps: Vec<String>,
    /// Specifier → resolved module name.
    pub dep_map: BTreeMap<String, String>,
}

/// Result of a bundling pass.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// Resolved module name → module.
    pub tree: BTreeMap<String, TreeItem>,
    /// Entry module names, when the engine declares them.
    pub entry_points: Option<Vec<String>>,
    /// Emitted bundle source.
    pub source: String,
}

impl BuildResult {
    /// Names of all bundled modules, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<String> {
        self.tree.keys().cloned().collect()
    }
}

/// Options passed to the bundling pass.
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Emit a self-executing bundle instead of loader registrations.
    pub sfx: bool,
    /// Development build (`process.env.NODE_ENV` is `"development"`).
    pub debug: bool,
}

impl BundleOptions {
    #[must_use]
    pub fn node_env(&self) -> &'static str {
        if self.debug {
            "development"
        } else {
            "production"
        }
    }
}

/// Specifier normalizer invoked by the engine for every import.
#[allow(async_fn_in_trait)]
pub trait Normalize {
    /// Map `specifier`, imported by the module `parent_name` loaded from
    /// `parent_address`, to the address to load. Entry points have no parent.
    async fn normalize(
        &mut self,
        specifier: &str,
        parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String>;
}

/// A bundling engine.
#[allow(async_fn_in_trait)]
pub trait BundleEngine {
    /// The engine's own specifier normalization.
    async fn normalize(
        &self,
        specifier: &str,
        parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String>;

    /// Load `address` through the engine pipeline.
    ///
    /// Returns `None` when nothing produced content for it.
    async fn fetch(&self, address: &str) -> Result<Option<String>>;

    /// Bundle starting at `entry`, normalizing every specifier through `hook`.
    async fn bundle<H: Normalize>(
        &self,
        entry: &str,
        hook: &mut H,
        options: &BundleOptions,
    ) -> Result<BuildResult>;
}
