use model::IdParseError;
use queries::QueryError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a read operation as a whole
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid Doris endpoint: {0}")]
    Endpoint(String),

    #[error(transparent)]
    Build(#[from] QueryError),

    #[error("trace not found")]
    TraceNotFound,

    /// A row of the trace id discovery query has no usable trace id
    #[error("invalid trace id in result: {0}")]
    InvalidTraceId(String),
}

impl From<IdParseError> for StorageError {
    fn from(e: IdParseError) -> Self {
        StorageError::InvalidTraceId(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A row that cannot become a domain value; the row is dropped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("missing column `{0}`")]
    Missing(String),

    #[error("invalid `{column}`: {reason}")]
    Invalid { column: String, reason: String },
}

impl MappingError {
    pub fn invalid(column: &str, reason: impl ToString) -> Self {
        MappingError::Invalid {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}
