//! Jaeger-shaped span and trace types
//!
//! These are the structures rows are reconstructed into. They are built fresh
//! for every request and handed to the transport layer for encoding.

use crate::ids::{SpanId, TraceId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Typed tag or log-field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int64(i64),
    Float64(f64),
}

/// A single key/value pair attached to a span, process or log entry
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Str(value.into()),
        }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: Value::Bool(value),
        }
    }

    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: Value::Int64(value),
        }
    }

    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: Value::Float64(value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Relationship a span has to another span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    ChildOf,
    FollowsFrom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRef {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub ref_type: RefType,
}

/// Timestamped log entry; the first field is always the `event` name
#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<KeyValue>,
}

/// The service that emitted a span
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub service_name: String,
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub operation_name: String,
    pub references: Vec<SpanRef>,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub tags: Vec<KeyValue>,
    pub logs: Vec<Log>,
    pub process: Process,
}

impl Span {
    /// Look up a tag by key
    pub fn tag(&self, key: &str) -> Option<&KeyValue> {
        self.tags.iter().find(|kv| kv.key == key)
    }
}

/// Spans sharing one trace id, in row-arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub spans: Vec<Span>,
}

impl Trace {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// One edge of the service dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLink {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
}
