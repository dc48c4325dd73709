use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Run configuration for the mutation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bitcode modules to load, in order.
    pub bitcode_paths: Vec<PathBuf>,

    /// Directory holding a `compile_commands.json` used by the junk
    /// detector to locate and classify C/C++ sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cxx_compilation_database_dir: Option<PathBuf>,

    /// Whitespace-separated compiler flags used when a source file has no
    /// entry in the compilation database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cxx_compilation_flags: Option<String>,

    /// Per-test wall-clock timeout. `None` leaves only the evaluator's
    /// step budget as the bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Config {
    pub fn new(bitcode_paths: Vec<PathBuf>) -> Self {
        Self {
            bitcode_paths,
            ..Self::default()
        }
    }

    /// Reject empty and duplicated path lists before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bitcode_paths.is_empty() {
            return Err(ConfigError::NoBitcodePaths);
        }

        let mut seen = HashSet::new();
        for path in &self.bitcode_paths {
            if !seen.insert(path) {
                return Err(ConfigError::DuplicateBitcodePath(path.clone()));
            }
        }

        Ok(())
    }

    /// True when the configuration carries any C/C++ source information
    /// for junk detection.
    pub fn has_junk_detection(&self) -> bool {
        self.cxx_compilation_database_dir.is_some() || self.cxx_compilation_flags.is_some()
    }
}
