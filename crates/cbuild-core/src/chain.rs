//! Fallback chain around the engine's specifier normalization.
//!
//! The engine's baseline answer is kept whenever it names something that
//! loads. Otherwise the chain tries, in order:
//! 1. the candidate exists on disk
//! 2. the candidate is a directory with an `index.js` (recorded as a fix)
//! 3. the engine can load the candidate anyway (plugins, virtual modules)
//! 4. package-manager resolution (recorded in the repo or fix table)
//!
//! If every step declines, the candidate is returned unchanged and the
//! engine reports its own error when loading it.

use crate::engine::{BundleEngine, Normalize, EMPTY_MODULE};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::locator;
use crate::paths::{address_to_path, path_to_url, project_importer};
use std::path::{Path, PathBuf};

/// One fallback step. First success wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Exists,
    DirectoryIndex,
    ForcedLoad,
    Package,
}

/// Steps in the order they are tried.
pub const STEPS: [Step; 4] = [
    Step::Exists,
    Step::DirectoryIndex,
    Step::ForcedLoad,
    Step::Package,
];

/// Normalization hook that records what it had to correct in a [`Ledger`].
pub struct ResolutionChain<'a, E> {
    engine: &'a E,
    ledger: &'a mut Ledger,
    base: PathBuf,
}

impl<'a, E: BundleEngine> ResolutionChain<'a, E> {
    pub fn new(engine: &'a E, ledger: &'a mut Ledger, base: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            ledger,
            base: base.into(),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `specifier` to the address the engine should load.
    pub async fn resolve(
        &mut self,
        specifier: &str,
        parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String> {
        let candidate = self
            .engine
            .normalize(specifier, parent_name, parent_address)
            .await?;

        for step in STEPS {
            if let Some(address) = self.attempt(step, specifier, &candidate, parent_address).await {
                if address != candidate {
                    tracing::debug!(%specifier, %candidate, %address, ?step, "specifier corrected");
                }
                return Ok(address);
            }
        }

        tracing::debug!(%specifier, %candidate, "no fallback applied");
        Ok(candidate)
    }

    async fn attempt(
        &mut self,
        step: Step,
        specifier: &str,
        candidate: &str,
        parent_address: Option<&str>,
    ) -> Option<String> {
        match step {
            Step::Exists => self.exists(candidate).await,
            Step::DirectoryIndex => self.directory_index(candidate).await,
            Step::ForcedLoad => self.forced_load(candidate).await,
            Step::Package => self.package(specifier, parent_address),
        }
    }

    async fn exists(&self, candidate: &str) -> Option<String> {
        if candidate == EMPTY_MODULE {
            return None;
        }

        let path = address_to_path(candidate, &self.base);
        tokio::fs::metadata(&path)
            .await
            .ok()
            .map(|_| candidate.to_string())
    }

    async fn directory_index(&mut self, candidate: &str) -> Option<String> {
        if candidate == EMPTY_MODULE {
            return None;
        }

        let stem = candidate.strip_suffix(".js").unwrap_or(candidate);
        let index = format!("{stem}/index.js");
        let index_path = address_to_path(&index, &self.base);

        match tokio::fs::metadata(&index_path).await {
            Ok(meta) if meta.is_file() => {
                let from = path_to_url(&address_to_path(candidate, &self.base));
                self.ledger.record_fix(from, path_to_url(&index_path));
                Some(index)
            }
            _ => None,
        }
    }

    async fn forced_load(&self, candidate: &str) -> Option<String> {
        match self.engine.fetch(candidate).await {
            Ok(Some(_)) => Some(candidate.to_string()),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "forced load failed");
                None
            }
        }
    }

    fn package(&mut self, specifier: &str, parent_address: Option<&str>) -> Option<String> {
        let importer = match parent_address.filter(|a| *a != EMPTY_MODULE) {
            Some(address) => address_to_path(address, &self.base),
            None => project_importer(&self.base),
        };

        match locator::locate(specifier, &importer, &self.base) {
            Ok(located) => {
                self.ledger.record(&located);
                Some(
                    located
                        .resolved_url(&self.base)
                        .unwrap_or_else(|| EMPTY_MODULE.to_string()),
                )
            }
            Err(e) => {
                tracing::debug!(%specifier, importer = %importer.display(), error = %e, "package lookup failed");
                None
            }
        }
    }
}

impl<E: BundleEngine> Normalize for ResolutionChain<'_, E> {
    async fn normalize(
        &mut self,
        specifier: &str,
        parent_name: Option<&str>,
        parent_address: Option<&str>,
    ) -> Result<String> {
        self.resolve(specifier, parent_name, parent_address).await
    }
}
