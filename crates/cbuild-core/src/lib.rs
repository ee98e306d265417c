#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod build;
pub mod chain;
pub mod config;
pub mod deptree;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod loader_config;
pub mod locator;
pub mod manifest;
pub mod package_tree;
pub mod paths;
pub mod synth;

pub use build::{build, BuildOutput};
pub use chain::ResolutionChain;
pub use config::BuildConfig;
pub use deptree::{extract_tree, Branch};
pub use engine::{BuildResult, BundleEngine, GraphEngine, Normalize};
pub use error::{Error, Result};
pub use ledger::{Ledger, PackageSpec};
pub use loader_config::LoaderConfig;
pub use locator::{locate, Located};
pub use synth::{synthesize, SynthOptions};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
