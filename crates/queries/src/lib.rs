/// SQL generation for the span table
///
/// Builds the statements behind every read operation of the storage plugin.
/// Nothing here touches the database; the output is plain SQL text executed
/// by the `storage` crate.
///
/// # Usage
///
/// ```rust,ignore
/// use queries::builder;
///
/// let sql = builder::find_trace_ids(&schema, &table, &params, &location);
/// executor.execute(&sql, |record| { ... }).await?;
/// ```
pub mod builder;
pub mod literal;

pub use builder::{PartitionHint, EARLIEST_START_ALIAS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown span kind `{0}`")]
    UnknownSpanKind(String),

    #[error("no trace ids to fetch")]
    EmptyTraceIds,

    #[error("invalid time range: {0}")]
    InvalidTime(String),

    #[error("failed to render query: {0}")]
    Format(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
