//! Logical -> physical column naming for the span and dependency tables
//!
//! Every place that needs a column name asks the mapping through
//! [`SchemaMapping::column`] / [`GraphSchemaMapping::column`]. Unset names are
//! filled with the canonical column names by `fill_default_values`.

use serde::{Deserialize, Serialize};

/// Logical fields of the span table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TraceId,
    SpanId,
    SpanName,
    ParentSpanId,
    Links,
    Timestamp,
    Duration,
    SpanAttributes,
    Events,
    ServiceName,
    ResourceAttributes,
    SpanKind,
    StatusCode,
    StatusMessage,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::TraceId,
        Field::SpanId,
        Field::SpanName,
        Field::ParentSpanId,
        Field::Links,
        Field::Timestamp,
        Field::Duration,
        Field::SpanAttributes,
        Field::Events,
        Field::ServiceName,
        Field::ResourceAttributes,
        Field::SpanKind,
        Field::StatusCode,
        Field::StatusMessage,
    ];

    /// Canonical physical column name
    pub fn default_column(self) -> &'static str {
        match self {
            Field::TraceId => "trace_id",
            Field::SpanId => "span_id",
            Field::SpanName => "span_name",
            Field::ParentSpanId => "parent_span_id",
            Field::Links => "links",
            Field::Timestamp => "timestamp",
            Field::Duration => "duration",
            Field::SpanAttributes => "span_attributes",
            Field::Events => "events",
            Field::ServiceName => "service_name",
            Field::ResourceAttributes => "resource_attributes",
            Field::SpanKind => "span_kind",
            Field::StatusCode => "status_code",
            Field::StatusMessage => "status_message",
        }
    }
}

/// Physical column names of the span table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMapping {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub span_name: String,
    #[serde(default)]
    pub parent_span_id: String,
    #[serde(default)]
    pub links: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub span_attributes: String,
    #[serde(default)]
    pub events: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub resource_attributes: String,
    #[serde(default)]
    pub span_kind: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
}

impl SchemaMapping {
    /// Mapping with every field set to its canonical column
    pub fn with_defaults() -> Self {
        let mut mapping = Self::default();
        mapping.fill_default_values();
        mapping
    }

    /// Set every empty field to its canonical column name
    pub fn fill_default_values(&mut self) {
        for field in Field::ALL {
            let slot = self.slot_mut(field);
            if slot.is_empty() {
                *slot = field.default_column().to_string();
            }
        }
    }

    /// Physical column for a logical field
    pub fn column(&self, field: Field) -> &str {
        match field {
            Field::TraceId => &self.trace_id,
            Field::SpanId => &self.span_id,
            Field::SpanName => &self.span_name,
            Field::ParentSpanId => &self.parent_span_id,
            Field::Links => &self.links,
            Field::Timestamp => &self.timestamp,
            Field::Duration => &self.duration,
            Field::SpanAttributes => &self.span_attributes,
            Field::Events => &self.events,
            Field::ServiceName => &self.service_name,
            Field::ResourceAttributes => &self.resource_attributes,
            Field::SpanKind => &self.span_kind,
            Field::StatusCode => &self.status_code,
            Field::StatusMessage => &self.status_message,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::TraceId => &mut self.trace_id,
            Field::SpanId => &mut self.span_id,
            Field::SpanName => &mut self.span_name,
            Field::ParentSpanId => &mut self.parent_span_id,
            Field::Links => &mut self.links,
            Field::Timestamp => &mut self.timestamp,
            Field::Duration => &mut self.duration,
            Field::SpanAttributes => &mut self.span_attributes,
            Field::Events => &mut self.events,
            Field::ServiceName => &mut self.service_name,
            Field::ResourceAttributes => &mut self.resource_attributes,
            Field::SpanKind => &mut self.span_kind,
            Field::StatusCode => &mut self.status_code,
            Field::StatusMessage => &mut self.status_message,
        }
    }
}

/// Logical fields of the dependency graph table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphField {
    Timestamp,
    CallerServiceName,
    CalleeServiceName,
    Count,
}

impl GraphField {
    pub const ALL: [GraphField; 4] = [
        GraphField::Timestamp,
        GraphField::CallerServiceName,
        GraphField::CalleeServiceName,
        GraphField::Count,
    ];

    pub fn default_column(self) -> &'static str {
        match self {
            GraphField::Timestamp => "timestamp",
            GraphField::CallerServiceName => "caller_service_name",
            GraphField::CalleeServiceName => "callee_service_name",
            GraphField::Count => "count",
        }
    }
}

/// Physical column names of the dependency graph table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchemaMapping {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub caller_service_name: String,
    #[serde(default)]
    pub callee_service_name: String,
    #[serde(default)]
    pub count: String,
}

impl GraphSchemaMapping {
    pub fn with_defaults() -> Self {
        let mut mapping = Self::default();
        mapping.fill_default_values();
        mapping
    }

    pub fn fill_default_values(&mut self) {
        for field in GraphField::ALL {
            let slot = self.slot_mut(field);
            if slot.is_empty() {
                *slot = field.default_column().to_string();
            }
        }
    }

    pub fn column(&self, field: GraphField) -> &str {
        match field {
            GraphField::Timestamp => &self.timestamp,
            GraphField::CallerServiceName => &self.caller_service_name,
            GraphField::CalleeServiceName => &self.callee_service_name,
            GraphField::Count => &self.count,
        }
    }

    fn slot_mut(&mut self, field: GraphField) -> &mut String {
        match field {
            GraphField::Timestamp => &mut self.timestamp,
            GraphField::CallerServiceName => &mut self.caller_service_name,
            GraphField::CalleeServiceName => &mut self.callee_service_name,
            GraphField::Count => &mut self.count,
        }
    }
}
