use queries::QueryError;
use storage::StorageError;
use thiserror::Error;
use tonic::Status;

/// Unified error type for the storage plugin service
#[derive(Debug, Error)]
pub enum QuerierError {
    /// Malformed request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Read operation failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias for QuerierError
pub type Result<T> = std::result::Result<T, QuerierError>;

impl From<QuerierError> for Status {
    fn from(err: QuerierError) -> Self {
        match err {
            QuerierError::InvalidArgument(message) => Status::invalid_argument(message),
            QuerierError::Storage(e) => storage_status(e),
        }
    }
}

fn storage_status(err: StorageError) -> Status {
    match err {
        StorageError::TraceNotFound => Status::not_found(err.to_string()),
        StorageError::Timeout(_) => Status::deadline_exceeded(err.to_string()),
        StorageError::Build(QueryError::Format(_)) => Status::internal(err.to_string()),
        StorageError::Build(_) => Status::invalid_argument(err.to_string()),
        StorageError::Query(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
            Status::unavailable(err.to_string())
        }
        StorageError::Query(_) | StorageError::InvalidTraceId(_) | StorageError::Endpoint(_) => {
            Status::internal(err.to_string())
        }
    }
}
