//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tabload_core::{
    ClientTimeouts, ColumnMeta, Connection, QueryResult, Result, Row, StatementResult, TabloadError, Value,
};

/// Mock MySQL connection recording every statement it receives.
///
/// Queries containing `ROW_COUNT()` answer with the configured insert count,
/// any other query returns the canned source rows.
pub struct MockConnection {
    pub name: String,
    pub rows: Vec<Row>,
    pub inserted: i64,
    /// Statements containing this pattern fail
    pub fail_on: Option<String>,
    log: Mutex<Vec<String>>,
    /// Logging flag observed by each statement
    logging_seen: Mutex<Vec<bool>>,
    sql_logging: Mutex<bool>,
    timeouts: Mutex<ClientTimeouts>,
}

impl MockConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            inserted: 0,
            fail_on: None,
            log: Mutex::new(Vec::new()),
            logging_seen: Mutex::new(Vec::new()),
            sql_logging: Mutex::new(true),
            timeouts: Mutex::new(ClientTimeouts {
                connect: Some(Duration::from_secs(5)),
                read: Some(Duration::from_secs(30)),
            }),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_inserted(mut self, inserted: i64) -> Self {
        self.inserted = inserted;
        self
    }

    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on = Some(pattern.into());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn logging_seen(&self) -> Vec<bool> {
        self.logging_seen.lock().clone()
    }

    /// Position of the first logged statement starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.log.lock().iter().position(|sql| sql.starts_with(prefix))
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.log.lock().push(sql.to_string());
        self.logging_seen.lock().push(*self.sql_logging.lock());
        match &self.fail_on {
            Some(pattern) if sql.contains(pattern.as_str()) => {
                Err(TabloadError::Query(format!("{} rejected: {}", self.name, sql)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mysql")
    }

    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        self.record(sql)?;
        Ok(StatementResult::default())
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql)?;
        if sql.contains("ROW_COUNT()") {
            return Ok(QueryResult {
                columns: vec![ColumnMeta {
                    name: "inserted".to_string(),
                    data_type: "BIGINT".to_string(),
                    ordinal: 0,
                }],
                rows: vec![Row::from_pairs([("inserted", Value::Int64(self.inserted))])],
                ..QueryResult::default()
            });
        }
        Ok(QueryResult {
            rows: self.rows.clone(),
            ..QueryResult::default()
        })
    }

    fn sql_logging(&self) -> bool {
        *self.sql_logging.lock()
    }

    fn set_sql_logging(&self, enabled: bool) {
        *self.sql_logging.lock() = enabled;
    }

    fn timeouts(&self) -> ClientTimeouts {
        *self.timeouts.lock()
    }

    fn set_timeouts(&self, timeouts: ClientTimeouts) {
        *self.timeouts.lock() = timeouts;
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

pub fn customer_rows() -> Vec<Row> {
    vec![
        Row::from_pairs([
            ("id", Value::Int64(1)),
            ("full_name", Value::String("Alice".into())),
        ]),
        Row::from_pairs([("id", Value::Int64(2)), ("full_name", Value::Null)]),
    ]
}
