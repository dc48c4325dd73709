use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::ir::Module;
use crate::loader::ModuleLoader;

/// Stable handle for a module in the store. Handles stay valid for the
/// lifetime of the store; modules are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub usize);

/// Exclusive owner of every loaded module. Other components address
/// modules through `ModuleId` and borrow them on demand.
#[derive(Debug, Default)]
pub struct ModuleStore {
    modules: Vec<Module>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one module through `loader` and take ownership of it.
    pub fn load(
        &mut self,
        loader: &dyn ModuleLoader,
        path: &Path,
    ) -> Result<ModuleId, LoadError> {
        let module = loader.load_module_at_path(path)?;
        Ok(self.add(module))
    }

    /// Take ownership of an already-built module.
    pub fn add(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Handles in load order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().enumerate().map(|(i, m)| (ModuleId(i), m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Type};

    fn empty_module(name: &str) -> Module {
        let mut b = FunctionBuilder::new("noop", vec![], Type::Void);
        b.ret(None);
        Module {
            name: name.to_string(),
            source_file: None,
            functions: vec![b.build()],
        }
    }

    #[test]
    fn handles_are_assigned_in_insertion_order() {
        let mut store = ModuleStore::new();
        let a = store.add(empty_module("a"));
        let b = store.add(empty_module("b"));

        assert_eq!(a, ModuleId(0));
        assert_eq!(b, ModuleId(1));
        assert_eq!(store.get(a).name, "a");
        assert_eq!(store.get(b).name, "b");
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![a, b]);
    }
}
