use crate::error::{Result, StorageError};
use crate::record::Record;
use async_trait::async_trait;
use config::DorisConfig;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Connection, Row};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Called once per result row; an error stops the query and is returned as is
pub type RowCallback<'a> = dyn FnMut(Record) -> Result<()> + Send + 'a;

/// Runs SQL text and feeds the rows, decoded to [`Record`]s, to a callback
///
/// `deadline` is the caller's deadline, if any. Implementations enforce the
/// tighter of it and their own configured timeout. Dropping the returned
/// future cancels the query.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn execute(
        &self,
        sql: &str,
        deadline: Option<Instant>,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()>;
}

/// Time left for a query: the configured timeout capped by the caller's
/// deadline. `None` means unbounded.
pub fn effective_timeout(
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    now: Instant,
) -> Option<Duration> {
    let remaining = deadline.map(|d| d.saturating_duration_since(now));
    match (timeout, remaining) {
        (Some(t), Some(r)) => Some(t.min(r)),
        (t, r) => t.or(r),
    }
}

/// Run `query` within `budget`, failing with [`StorageError::Timeout`] once it
/// runs out
async fn with_timeout<F>(budget: Option<Duration>, query: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match budget {
        Some(budget) => tokio::time::timeout(budget, query)
            .await
            .map_err(|_| StorageError::Timeout(budget))?,
        None => query.await,
    }
}

/// Text of one column; `None` for SQL `NULL`
fn decode_column(value: Option<Vec<u8>>) -> Option<String> {
    value.map(|bytes| match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn record_from_columns<'a>(
    columns: impl IntoIterator<Item = (&'a str, Option<Vec<u8>>)>,
) -> Record {
    let columns = columns.into_iter();
    let mut record = Record::with_capacity(columns.size_hint().0);
    for (name, value) in columns {
        if let Some(text) = decode_column(value) {
            record.insert(name, text);
        }
    }
    record
}

/// [`QueryRunner`] over a pooled MySQL-protocol connection to Doris
#[derive(Debug, Clone)]
pub struct DorisExecutor {
    pool: MySqlPool,
    timeout: Option<Duration>,
}

impl DorisExecutor {
    /// Create the connection pool; connections are opened on first use
    pub fn connect_lazy(config: &DorisConfig, timeout: Option<Duration>) -> Result<Self> {
        let (host, port) = config
            .host_port()
            .map_err(|e| StorageError::Endpoint(format!("{:#}", e)))?;
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database)
            // leave the session zone alone; timestamps are rendered in the
            // configured location
            .timezone(None::<String>);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);

        debug!(
            host,
            port,
            database = %config.database,
            max_connections = config.max_connections,
            "Doris connection pool created"
        );

        Ok(Self::from_pool(pool, timeout))
    }

    pub fn from_pool(pool: MySqlPool, timeout: Option<Duration>) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Open a connection and ping the server, within the configured timeout
    pub async fn ping(&self) -> Result<()> {
        with_timeout(self.timeout, async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await?;
            Ok::<(), StorageError>(())
        })
        .await
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Doris connection pool closed");
    }

    async fn run(&self, sql: &str, on_row: &mut RowCallback<'_>) -> Result<()> {
        // raw_sql uses the text protocol, so every non-NULL value arrives as
        // bytes regardless of the column type
        let mut rows = sqlx::raw_sql(sql).fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            on_row(decode_row(&row)?)?;
        }
        Ok(())
    }
}

fn decode_row(row: &MySqlRow) -> Result<Record> {
    let values = row
        .columns()
        .iter()
        .map(|column| -> Result<(&str, Option<Vec<u8>>)> {
            let value = row.try_get_unchecked(column.ordinal())?;
            Ok((column.name(), value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(record_from_columns(values))
}

#[async_trait]
impl QueryRunner for DorisExecutor {
    async fn execute(
        &self,
        sql: &str,
        deadline: Option<Instant>,
        on_row: &mut RowCallback<'_>,
    ) -> Result<()> {
        debug!(query = %sql, "executing query");

        let budget = effective_timeout(self.timeout, deadline, Instant::now());
        with_timeout(budget, self.run(sql, on_row)).await
    }
}
