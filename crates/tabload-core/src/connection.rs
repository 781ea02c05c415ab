//! Connection trait

use crate::{ClientTimeouts, QueryResult, Result, Row, StatementResult, quote_identifier_for};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Lazily produced rows of a streaming query.
///
/// Rows are pulled one at a time so arbitrarily large results never need to
/// be held in memory.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mysql")
    fn driver_name(&self) -> &str;

    /// Get the dialect identifier for this connection
    ///
    /// Returns None if the dialect is unknown.
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }

    /// Execute a statement that does not return rows
    async fn execute(&self, sql: &str) -> Result<StatementResult>;

    /// Execute a query and buffer every row
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Execute a query and yield its rows lazily
    ///
    /// The default implementation buffers the whole result and replays it.
    /// Drivers able to stream rows from the wire should override it.
    async fn query_stream(&self, sql: &str) -> Result<RowStream> {
        let result = self.query(sql).await?;
        let rows = result.rows.into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(rows)))
    }

    /// Quote an identifier for this connection's dialect
    fn quote_identifier(&self, identifier: &str) -> String {
        quote_identifier_for(self.dialect_id(), identifier)
    }

    /// Whether executed statements are logged
    fn sql_logging(&self) -> bool {
        false
    }

    /// Enable or disable statement logging
    fn set_sql_logging(&self, _enabled: bool) {}

    /// Current client-side timeouts
    fn timeouts(&self) -> ClientTimeouts {
        ClientTimeouts::unlimited()
    }

    /// Replace the client-side timeouts
    fn set_timeouts(&self, _timeouts: ClientTimeouts) {}

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Shared handle to a connection
pub type SharedConnection = Arc<dyn Connection>;
