//! Named connections available to import jobs

use indexmap::IndexMap;
use parking_lot::RwLock;
use tabload_core::SharedConnection;

use crate::ConfigError;

/// Connections addressed by the names used in job definitions
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<IndexMap<String, SharedConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `name`, returning the one it replaces
    pub fn register(
        &self,
        name: impl Into<String>,
        connection: SharedConnection,
    ) -> Option<SharedConnection> {
        let name = name.into();
        tracing::debug!(connection = %name, driver = connection.driver_name(), "registering connection");
        self.connections.write().insert(name, connection)
    }

    /// Builder: register a connection
    pub fn with(self, name: impl Into<String>, connection: SharedConnection) -> Self {
        self.register(name, connection);
        self
    }

    /// Get a registered connection
    pub fn get(&self, name: &str) -> Result<SharedConnection, ConfigError> {
        self.connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownConnection(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<SharedConnection> {
        self.connections.write().shift_remove(name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Close every connection, keeping the first error
    pub async fn close_all(&self) -> tabload_core::Result<()> {
        let connections: Vec<(String, SharedConnection)> =
            self.connections.write().drain(..).collect();
        let mut first_error = None;
        for (name, connection) in connections {
            if let Err(e) = connection.close().await {
                tracing::warn!(connection = %name, error = %e, "failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
