//! Doris-backed span storage: query execution, row mapping and the read
//! operations built on top of them.

pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod reader;
pub mod record;
pub mod sanitize;

pub use diagnostics::{CollectingDiagnostics, Diagnostics, TracingDiagnostics};
pub use error::{MappingError, Result, StorageError};
pub use executor::{DorisExecutor, QueryRunner, RowCallback};
pub use reader::{ReaderSettings, RequestContext, SpanReader};
pub use record::Record;
pub use sanitize::sanitize_trace;
