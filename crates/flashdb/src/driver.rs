//! Driver: resolves the engine and opens connection handles

use std::sync::Arc;

use flashdb_engine::{EngineFactory, EngineRegistry, RegistryError};
use tracing::info;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::options::{ConnectionOptions, EngineSelection};

pub struct Driver {
    options: ConnectionOptions,
    registry: EngineRegistry,
}

impl Driver {
    /// Driver over every engine built into this crate
    pub fn new(options: ConnectionOptions) -> Self {
        Self::with_registry(options, EngineRegistry::new())
    }

    pub fn with_registry(options: ConnectionOptions, registry: EngineRegistry) -> Self {
        Self { options, registry }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Factory for the configured engine
    pub fn resolve_engine(&self) -> Result<Arc<dyn EngineFactory>> {
        match &self.options.engine {
            Some(EngineSelection::Injected(factory)) => Ok(Arc::clone(factory)),
            Some(EngineSelection::Named(name)) => {
                self.registry.lookup(name).map_err(|e| match e {
                    RegistryError::EngineNotFound { name, available } => {
                        Error::DependencyUnavailable {
                            engine: name,
                            available,
                        }
                    }
                })
            }
            None => self
                .registry
                .first_available()
                .ok_or_else(|| Error::DependencyUnavailable {
                    engine: "any".to_string(),
                    available: Vec::new(),
                }),
        }
    }

    /// Open the engine and build a handle around it
    pub fn connect(&self) -> Result<Connection> {
        let factory = self.resolve_engine()?;
        let engine = factory.open().map_err(|source| Error::ConnectionFailed {
            engine: factory.name().to_string(),
            source,
        })?;

        info!(engine = engine.name(), "connection opened");
        Ok(Connection::new(engine, &self.options))
    }
}

/// Open a connection with the built-in engines
pub fn connect(options: ConnectionOptions) -> Result<Connection> {
    Driver::new(options).connect()
}

/// Close a connection, rolling back any open transaction
pub fn disconnect(connection: Connection) -> Result<()> {
    connection.disconnect()
}
