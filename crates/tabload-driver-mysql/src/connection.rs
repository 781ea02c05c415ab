//! MySQL connection implementation

use async_trait::async_trait;
use mysql_async::{
    Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row as MySqlRow,
    consts::ColumnType, prelude::*,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tabload_core::{
    ClientTimeouts, ColumnMeta, Connection, QueryResult, Result, Row, RowStream, StatementResult,
    TabloadError, Value,
};

use crate::MySqlConnectOptions;

/// Rows buffered between the wire reader task and the consumer of a stream
const STREAM_BUFFER: usize = 256;

/// Global Tokio runtime for MySQL operations.
///
/// mysql_async internally calls `tokio::spawn` for connection pooling and networking,
/// so every pool operation is dispatched onto this runtime regardless of which
/// executor the caller runs on.
fn get_mysql_runtime() -> Result<&'static tokio::runtime::Runtime> {
    static RUNTIME: OnceLock<std::result::Result<tokio::runtime::Runtime, String>> =
        OnceLock::new();
    RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .thread_name("tabload-mysql-runtime")
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| {
            TabloadError::Driver(format!("Failed to create Tokio runtime for MySQL driver: {}", e))
        })
}

/// Run `fut`, failing with a timeout error once `limit` elapses
async fn with_timeout<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            TabloadError::Timeout(format!("{} exceeded {} ms", what, limit.as_millis()))
        })?,
        None => fut.await,
    }
}

/// MySQL connection wrapper.
///
/// The pool holds exactly one physical connection and never resets it, so
/// session state (table locks, `ROW_COUNT()`) survives between calls.
pub struct MySqlConnection {
    pool: Pool,
    database_name: Option<String>,
    sql_logging: AtomicBool,
    timeouts: Mutex<ClientTimeouts>,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect to a MySQL database
    pub async fn connect(options: &MySqlConnectOptions) -> Result<Self> {
        tracing::info!(
            host = %options.host,
            port = %options.port,
            database = ?options.database,
            "connecting to MySQL database"
        );

        let mut opts_builder = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port);

        if let Some(db) = &options.database {
            opts_builder = opts_builder.db_name(Some(db.clone()));
        }
        if let Some(u) = &options.user {
            opts_builder = opts_builder.user(Some(u.clone()));
        }
        if let Some(p) = &options.password {
            opts_builder = opts_builder.pass(Some(p.clone()));
        }

        let constraints = PoolConstraints::new(1, 1).ok_or_else(|| {
            TabloadError::Connection(
                "Failed to configure MySQL pool constraints (min=1, max=1)".into(),
            )
        })?;

        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_reset_connection(false);
        opts_builder = opts_builder.pool_opts(pool_opts);

        let opts: Opts = opts_builder.into();
        let timeouts = options.timeouts();

        // Pool creation and the initial connection test must run on the Tokio runtime
        let pool = get_mysql_runtime()?
            .spawn(async move {
                let pool = Pool::new(opts);
                with_timeout(timeouts.connect, "connecting to MySQL", async {
                    // Verify connectivity by acquiring and releasing a connection
                    let _conn = pool.get_conn().await.map_err(|e| {
                        TabloadError::Connection(format!("Failed to connect to MySQL: {}", e))
                    })?;
                    Ok(())
                })
                .await?;
                Ok::<Pool, TabloadError>(pool)
            })
            .await
            .map_err(|e| {
                TabloadError::Connection(format!("MySQL connection task failed: {}", e))
            })??;

        tracing::info!(host = %options.host, port = %options.port, "MySQL connection established");
        Ok(Self {
            pool,
            database_name: options.database.clone(),
            sql_logging: AtomicBool::new(options.log_statements),
            timeouts: Mutex::new(timeouts),
            closed: AtomicBool::new(false),
        })
    }

    /// Database selected at connect time, if any
    pub fn default_database(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// Get a connection from the pool, dispatched on the MySQL Tokio runtime
    async fn get_conn(&self) -> Result<Conn> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TabloadError::Connection("MySQL connection is closed".into()));
        }
        let pool = self.pool.clone();
        let limit = self.timeouts.lock().connect;
        get_mysql_runtime()?
            .spawn(async move {
                with_timeout(limit, "acquiring a MySQL connection", async move {
                    pool.get_conn().await.map_err(|e| {
                        TabloadError::Connection(format!("Failed to get MySQL connection: {}", e))
                    })
                })
                .await
            })
            .await
            .map_err(|e| TabloadError::Connection(format!("MySQL get_conn task failed: {}", e)))?
    }

    fn log_statement(&self, sql: &str) {
        if self.sql_logging.load(Ordering::Relaxed) {
            tracing::info!(target: "tabload::sql", sql = %sql, "executing SQL");
        }
    }
}

/// Convert mysql_async Value to our Value type, using column type metadata
/// to correctly interpret byte strings from the text protocol.
pub(crate) fn mysql_value_to_value(val: mysql_async::Value, col_type: ColumnType) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => match col_type {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_YEAR => match s.parse::<i64>() {
                    Ok(v) => Value::Int64(v),
                    Err(_) => s.parse::<u64>().map(Value::UInt64).unwrap_or(Value::String(s)),
                },
                ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
                    s.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(s))
                }
                ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                    Value::Decimal(s)
                }
                _ => Value::String(s),
            },
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(v) => Value::Int64(v),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float64(f as f64),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                match date {
                    Some(date) => Value::Date(date),
                    None => Value::String(format!("{:04}-{:02}-{:02}", year, month, day)),
                }
            } else {
                match date.and_then(|d| {
                    d.and_hms_micro_opt(hour as u32, min as u32, sec as u32, micro)
                }) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::String(format!(
                        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                        year, month, day, hour, min, sec
                    )),
                }
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            if !negative && days == 0 {
                if let Some(t) = chrono::NaiveTime::from_hms_micro_opt(
                    hours as u32,
                    mins as u32,
                    secs as u32,
                    micros,
                ) {
                    return Value::Time(t);
                }
            }
            let total_hours = days * 24 + hours as u32;
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

/// Column names and wire types of a result set
fn column_layout(columns: &[mysql_async::Column]) -> (Arc<[String]>, Vec<ColumnType>) {
    let names: Vec<String> = columns.iter().map(|c| c.name_str().to_string()).collect();
    let types = columns.iter().map(|c| c.column_type()).collect();
    (names.into(), types)
}

fn convert_row(mysql_row: MySqlRow, names: &Arc<[String]>, types: &[ColumnType]) -> Row {
    let values = (0..names.len())
        .map(|idx| {
            let mysql_val: mysql_async::Value =
                mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
            let col_type = types
                .get(idx)
                .copied()
                .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
            mysql_value_to_value(mysql_val, col_type)
        })
        .collect();
    Row::new(names.clone(), values)
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mysql")
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        self.log_statement(sql);
        let mut conn = self.get_conn().await?;
        let limit = self.timeouts.lock().read;
        let sql = sql.to_string();

        let affected_rows = get_mysql_runtime()?
            .spawn(async move {
                with_timeout(limit, "executing statement", async move {
                    conn.query_drop(&sql).await.map_err(|e| {
                        TabloadError::Query(format!("Failed to execute statement: {}", e))
                    })?;
                    Ok(conn.affected_rows())
                })
                .await
            })
            .await
            .map_err(|e| TabloadError::Query(format!("MySQL execute task failed: {}", e)))??;

        tracing::debug!(affected_rows = affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.log_statement(sql);
        let start_time = std::time::Instant::now();
        let mut conn = self.get_conn().await?;
        let limit = self.timeouts.lock().read;
        let sql = sql.to_string();

        let (columns, rows) = get_mysql_runtime()?
            .spawn(async move {
                with_timeout(limit, "executing query", async move {
                    let mut result = conn.query_iter(&sql).await.map_err(|e| {
                        TabloadError::Query(format!("Failed to execute query: {}", e))
                    })?;

                    let (names, types) = column_layout(result.columns_ref());
                    let columns: Vec<ColumnMeta> = names
                        .iter()
                        .zip(types.iter())
                        .enumerate()
                        .map(|(ordinal, (name, col_type))| ColumnMeta {
                            name: name.clone(),
                            data_type: format!("{:?}", col_type),
                            ordinal,
                        })
                        .collect();

                    let mysql_rows: Vec<MySqlRow> = result.collect().await.map_err(|e| {
                        TabloadError::Query(format!("Failed to read query result: {}", e))
                    })?;
                    let rows: Vec<Row> = mysql_rows
                        .into_iter()
                        .map(|r| convert_row(r, &names, &types))
                        .collect();

                    Ok((columns, rows))
                })
                .await
            })
            .await
            .map_err(|e| TabloadError::Query(format!("MySQL query task failed: {}", e)))??;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            execution_time_ms = execution_time_ms,
            "query executed successfully"
        );

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms,
        })
    }

    /// Rows are read from the wire by a task on the MySQL runtime and handed
    /// over through a bounded channel, so at most `STREAM_BUFFER` rows are
    /// held in memory at once.
    async fn query_stream(&self, sql: &str) -> Result<RowStream> {
        self.log_statement(sql);
        let mut conn = self.get_conn().await?;
        let limit = self.timeouts.lock().read;
        let sql = sql.to_string();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Row>>(STREAM_BUFFER);

        get_mysql_runtime()?.spawn(async move {
            let opened = with_timeout(limit, "opening query stream", async {
                conn.query_iter(&sql)
                    .await
                    .map_err(|e| TabloadError::Query(format!("Failed to execute query: {}", e)))
            })
            .await;
            let mut result = match opened {
                Ok(result) => result,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            let (names, types) = column_layout(result.columns_ref());
            let mut streamed = 0u64;
            loop {
                let next = with_timeout(limit, "reading query stream", async {
                    result.next().await.map_err(|e| {
                        TabloadError::Query(format!("Failed to read query row: {}", e))
                    })
                })
                .await;
                match next {
                    Ok(Some(mysql_row)) => {
                        streamed += 1;
                        if tx.send(Ok(convert_row(mysql_row, &names, &types))).await.is_err() {
                            tracing::debug!(rows = streamed, "query stream dropped by consumer");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            if let Err(e) = result.drop_result().await {
                tracing::warn!(error = %e, "failed to discard remaining query rows");
            }
            tracing::debug!(rows = streamed, "query stream finished");
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    fn sql_logging(&self) -> bool {
        self.sql_logging.load(Ordering::Relaxed)
    }

    fn set_sql_logging(&self, enabled: bool) {
        self.sql_logging.store(enabled, Ordering::Relaxed);
    }

    fn timeouts(&self) -> ClientTimeouts {
        *self.timeouts.lock()
    }

    fn set_timeouts(&self, timeouts: ClientTimeouts) {
        *self.timeouts.lock() = timeouts;
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing MySQL connection pool");
        let pool = self.pool.clone();
        get_mysql_runtime()?
            .spawn(async move { pool.disconnect().await })
            .await
            .map_err(|e| TabloadError::Connection(format!("MySQL close task failed: {}", e)))?
            .map_err(|e| {
                TabloadError::Connection(format!("Failed to close MySQL connection: {}", e))
            })?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
