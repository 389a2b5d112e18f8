//! Read-request parameters

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Filters for trace search
///
/// Tags are kept ordered so the generated predicates are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceQueryParameters {
    pub service_name: String,
    pub operation_name: String,
    pub tags: BTreeMap<String, String>,
    pub start_time_min: Option<DateTime<Utc>>,
    pub start_time_max: Option<DateTime<Utc>>,
    pub duration_min: Option<Duration>,
    pub duration_max: Option<Duration>,
    pub num_traces: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationQueryParameters {
    pub service_name: String,
    /// Jaeger span kind (`server`, `client`, ...); `None` matches every kind
    pub span_kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    /// Jaeger span kind, empty when the stored kind is unknown
    pub span_kind: String,
}
