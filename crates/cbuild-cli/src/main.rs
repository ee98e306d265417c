#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::{CommandFactory, Parser};
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cbuild")]
#[command(author, version, about = "SystemJS node module bundling tool", long_about = None)]
struct Cli {
    /// Use development environment
    #[arg(short, long, value_name = "FLAG", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    debug: Option<bool>,

    /// Add package to mappings
    #[arg(short, long = "map", value_name = "PACKAGE")]
    map: Vec<String>,

    /// Main JavaScript source to bundle
    #[arg(short, long, value_name = "FILE")]
    source: Option<PathBuf>,

    /// Directory with package.json and config.js
    #[arg(short, long, value_name = "PATH")]
    package: Option<PathBuf>,

    /// Write output bundle to file
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Write path mappings to new config file
    #[arg(short = 'C', long, value_name = "FILE")]
    out_config: Option<PathBuf>,

    /// Merge another file into new config file
    #[arg(short = 'I', long, value_name = "FILE")]
    include_config: Vec<PathBuf>,

    /// Suppress terminal output
    #[arg(short, long, value_name = "FLAG", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    quiet: Option<bool>,

    /// Print dependency tree of bundled files
    #[arg(short, long, value_name = "FLAG", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    verbose: Option<bool>,

    /// Create static (sfx) bundle
    #[arg(short = 'x', long = "static", value_name = "FLAG", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    sfx: Option<bool>,

    /// Print a JSON summary instead of human output
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Build environment; `development` forces --debug
    #[arg(long, env = "NODE_ENV", hide = true)]
    node_env: Option<String>,
}

/// Parse an optional boolean flag value. `0`, `no` and `false` are false,
/// anything else is true.
fn parse_flag(value: &str) -> Result<bool, String> {
    let falsy = ["0", "no", "false"];
    Ok(!falsy.iter().any(|f| value.eq_ignore_ascii_case(f)))
}

fn resolve(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

fn main() -> Result<()> {
    if std::env::args_os().len() < 2 {
        Cli::command().print_help().into_diagnostic()?;
        return Ok(());
    }

    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let quiet = cli.quiet.unwrap_or(false);
    logging::init(quiet || cli.json, cli.log_json);

    let debug_flag = cli.debug.unwrap_or(false);
    let debug = debug_flag || cli.node_env.as_deref() == Some("development");

    let action = commands::bundle::BundleAction {
        base: resolve(&cwd, cli.package.unwrap_or_else(|| cwd.clone())),
        source: cli.source.map(|p| resolve(&cwd, p)),
        out: cli.out.map(|p| resolve(&cwd, p)),
        out_config: cli.out_config.map(|p| resolve(&cwd, p)),
        include_configs: cli
            .include_config
            .into_iter()
            .map(|p| resolve(&cwd, p))
            .collect(),
        map_packages: cli.map,
        debug,
        debug_flag,
        node_env: cli.node_env,
        quiet,
        verbose: cli.verbose.unwrap_or(false),
        sfx: cli.sfx.unwrap_or(false),
        json: cli.json,
    };

    let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
    let ok = rt.block_on(commands::bundle::run(action))?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
