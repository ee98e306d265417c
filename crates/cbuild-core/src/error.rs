use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cbuild operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot find module '{specifier}' from '{importer}'")]
    NotFound { specifier: String, importer: PathBuf },

    #[error("Failed to read manifest at {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest at {path}: {reason}")]
    ManifestMalformed { path: PathBuf, reason: String },

    #[error("Failed to parse loader config from {origin}: {reason}")]
    ConfigParse { origin: String, reason: String },

    #[error("Bundling engine error: {0}")]
    Engine(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    #[must_use]
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Whether this error means the specifier could not be located at all.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
