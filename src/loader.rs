use std::fs;
use std::path::Path;

use crate::error::LoadError;
use crate::ir::Module;

/// The only I/O boundary for IR: everything above it works on modules
/// handed over by a loader, so tests can inject modules built in memory.
pub trait ModuleLoader {
    fn load_module_at_path(&self, path: &Path) -> Result<Module, LoadError>;
}

/// Disk loader for serde-JSON bitcode modules.
#[derive(Debug, Default)]
pub struct JsonModuleLoader;

impl ModuleLoader for JsonModuleLoader {
    fn load_module_at_path(&self, path: &Path) -> Result<Module, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
