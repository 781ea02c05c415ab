//! MySQL driver entry point and connection options

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tabload_core::{ClientTimeouts, Result, SharedConnection};

use crate::MySqlConnection;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    MySqlDriver::DEFAULT_PORT
}

fn default_connect_timeout_secs() -> Option<u64> {
    Some(10)
}

fn default_true() -> bool {
    true
}

/// Options needed to open a MySQL connection
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Seconds allowed to obtain a connection; absent means unlimited
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: Option<u64>,
    /// Seconds allowed per statement or streamed row; absent means unlimited
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    /// Log every executed statement at info level
    #[serde(default = "default_true")]
    pub log_statements: bool,
}

impl Default for MySqlConnectOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: None,
            user: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: None,
            log_statements: true,
        }
    }
}

impl MySqlConnectOptions {
    /// Client-side timeouts described by these options
    pub fn timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            connect: self.connect_timeout_secs.map(Duration::from_secs),
            read: self.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// MySQL database driver
pub struct MySqlDriver;

impl MySqlDriver {
    pub const DEFAULT_PORT: u16 = 3306;

    pub fn name(&self) -> &'static str {
        "mysql"
    }

    #[tracing::instrument(skip(self, options), fields(host = %options.host, database = ?options.database))]
    pub async fn connect(&self, options: &MySqlConnectOptions) -> Result<SharedConnection> {
        let conn = MySqlConnection::connect(options).await?;
        Ok(Arc::new(conn))
    }
}
