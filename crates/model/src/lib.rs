//! # model
//!
//! Domain types shared by the query builder, the row mapper and the gRPC layer:
//! identifiers, spans, traces, dependency links, read parameters and the
//! span-kind translation table.

pub mod ids;
pub mod kind;
pub mod query;
pub mod span;
pub mod tags;

pub use ids::{IdParseError, SpanId, TraceId};
pub use kind::{SpanKindTable, SPAN_KIND_TAG};
pub use query::{Operation, OperationQueryParameters, TraceQueryParameters};
pub use span::{DependencyLink, KeyValue, Log, Process, RefType, Span, SpanRef, Trace, Value};
