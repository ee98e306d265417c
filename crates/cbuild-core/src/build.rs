//! One complete build: bundle the project and generate its loader config.

use crate::chain::ResolutionChain;
use crate::config::BuildConfig;
use crate::engine::{BuildResult, BundleEngine, BundleOptions, GraphEngine};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::locator::{self, Located};
use crate::manifest;
use crate::paths::{normalize_lexically, path_to_url, project_importer, url_to_path};
use crate::synth::{self, SynthOptions};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};

/// What a build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Engine result: module graph and bundle source.
    pub result: BuildResult,
    /// Entry address the bundle started from.
    pub entry: String,
    /// Generated loader configuration, when one was requested.
    pub config_text: Option<String>,
}

/// Run a build as described by `config`.
pub async fn build(config: &BuildConfig) -> Result<BuildOutput> {
    let base = config.base.clone();
    let entry = entry_address(config)?;

    let engine = GraphEngine::load(&base, &config.config_file)?;
    let mut ledger = Ledger::new();
    ledger.absorb(engine.config(), &base);

    let options = BundleOptions {
        sfx: config.sfx,
        debug: config.debug,
    };
    tracing::info!(%entry, env = options.node_env(), sfx = options.sfx, "bundling");

    let result = {
        let mut chain = ResolutionChain::new(&engine, &mut ledger, &base);
        engine.bundle(&entry, &mut chain, &options).await?
    };

    for located in locate_packages(&config.map_packages, &base).await? {
        ledger.record(&located);
    }

    // Everything that can fail runs before the first write.
    let config_text = match &config.config_out {
        Some(_) => {
            let options = SynthOptions {
                shim_module: config.shim_module.clone(),
                prologue: read_includes(&config.include_configs).await?,
                ..SynthOptions::default()
            };
            Some(synth::synthesize(&ledger, &base, &options)?)
        }
        None => None,
    };

    if let Some(out) = &config.bundle_out {
        write_output(out, &result.source).await?;
        tracing::info!(path = %out.display(), modules = result.tree.len(), "bundle written");
    }

    if let (Some(out), Some(text)) = (&config.config_out, &config_text) {
        write_output(out, text).await?;
        tracing::info!(path = %out.display(), "loader config written");
    }

    Ok(BuildOutput {
        result,
        entry,
        config_text,
    })
}

/// Absolute address of the entry source.
fn entry_address(config: &BuildConfig) -> Result<String> {
    let base = &config.base;
    let source = match &config.source {
        Some(source) => base.join(source),
        None => base.join(url_to_path(&manifest::project_entry(base)?)),
    };
    Ok(path_to_url(&normalize_lexically(&source)))
}

/// Locate packages requested by name, on blocking worker threads.
///
/// Results come back in request order so the ledger sees the same sequence
/// of writes on every run.
async fn locate_packages(names: &[String], base: &Path) -> Result<Vec<Located>> {
    let importer = project_importer(base);

    let lookups = names.iter().map(|name| {
        let name = name.clone();
        let importer = importer.clone();
        let base = base.to_path_buf();
        async move {
            tokio::task::spawn_blocking(move || locator::locate(&name, &importer, &base))
                .await
                .map_err(|e| Error::other(format!("package lookup task failed: {e}")))?
        }
    });

    try_join_all(lookups).await
}

async fn read_includes(paths: &[PathBuf]) -> Result<Vec<String>> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(tokio::fs::read_to_string(path).await?);
    }
    Ok(parts)
}

async fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
