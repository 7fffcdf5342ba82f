//! Engine registry: locates engines by name

use std::sync::Arc;
use thiserror::Error;

use crate::{EngineFactory, SqliteFactory};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Engine not found: {name} (available: {available:?})")]
    EngineNotFound {
        name: String,
        available: Vec<String>,
    },
}

/// Engines known by name, in preference order
pub struct EngineRegistry {
    factories: Vec<Arc<dyn EngineFactory>>,
}

impl EngineRegistry {
    /// Registry holding every engine compiled into this build
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    fn register_builtins(&mut self) {
        self.register(Arc::new(SqliteFactory));

        #[cfg(feature = "duckdb")]
        self.register(Arc::new(crate::DuckDbFactory));
    }

    /// Register a factory. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn EngineFactory>) {
        self.factories
            .retain(|f| !f.name().eq_ignore_ascii_case(factory.name()));
        self.factories.push(factory);
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn EngineFactory>, RegistryError> {
        self.factories
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| RegistryError::EngineNotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Preferred engine when none is named
    pub fn first_available(&self) -> Option<Arc<dyn EngineFactory>> {
        self.factories.first().cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|f| f.name().to_string()).collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
