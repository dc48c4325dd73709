use std::path::PathBuf;

use thiserror::Error;

/// Rejected run configuration. Fatal before anything is loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no bitcode paths configured")]
    NoBitcodePaths,

    #[error("duplicate bitcode path {0:?}")]
    DuplicateBitcodePath(PathBuf),
}

/// A module path that could not be turned into IR.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read module at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse module at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no module registered for {path:?}")]
    NotFound { path: PathBuf },
}

/// The compiler rejected a module. Fatal for the baseline; recorded as an
/// invalid execution when it happens to a mutant.
#[derive(Debug, Error)]
#[error("function `{function}`: {reason}")]
pub struct CompileError {
    pub function: String,
    pub reason: String,
}

impl CompileError {
    pub fn new(function: &str, reason: impl Into<String>) -> Self {
        Self {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}
