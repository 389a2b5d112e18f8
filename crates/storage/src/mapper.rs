//! Row -> domain value conversion
//!
//! Only the columns the schema names are read; everything is text until it is
//! parsed here. Identity and timing columns are required and reject the row,
//! the JSON blobs and status/kind columns degrade to a warning.

use crate::diagnostics::Diagnostics;
use crate::error::MappingError;
use crate::record::Record;
use config::{Field, GraphField, GraphSchemaMapping, Location, SchemaMapping};
use model::tags::{
    ERROR_TAG, EVENT_FIELD, STATUS_CODE_ERROR, STATUS_CODE_TAG, STATUS_DESCRIPTION_TAG,
};
use model::{
    DependencyLink, KeyValue, Log, Process, RefType, Span, SpanId, SpanKindTable, SpanRef,
    TraceId, SPAN_KIND_TAG,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    attributes: Map<String, JsonValue>,
}

/// Everything the span mapper needs besides the row itself
#[derive(Debug, Clone, Copy)]
pub struct SpanMapping<'a> {
    pub schema: &'a SchemaMapping,
    pub location: &'a Location,
    pub kinds: &'a SpanKindTable,
}

impl SpanMapping<'_> {
    pub fn map(&self, record: &Record, diagnostics: &dyn Diagnostics) -> Result<Span, MappingError> {
        map_span(self.schema, self.location, self.kinds, record, diagnostics)
    }
}

/// Build a [`Span`] from one row of the span table
pub fn map_span(
    schema: &SchemaMapping,
    location: &Location,
    kinds: &SpanKindTable,
    record: &Record,
    diagnostics: &dyn Diagnostics,
) -> Result<Span, MappingError> {
    let trace_id_column = schema.column(Field::TraceId);
    let trace_id: TraceId = record
        .require(trace_id_column)?
        .parse()
        .map_err(|e| MappingError::invalid(trace_id_column, e))?;

    let span_id_column = schema.column(Field::SpanId);
    let span_id: SpanId = record
        .require(span_id_column)?
        .parse()
        .map_err(|e| MappingError::invalid(span_id_column, e))?;

    let operation_name = record.require(schema.column(Field::SpanName))?.to_string();

    let mut references = Vec::new();

    let parent_column = schema.column(Field::ParentSpanId);
    let parent = record.get_or_empty(parent_column);
    if !parent.is_empty() {
        let parent: SpanId = parent
            .parse()
            .map_err(|e| MappingError::invalid(parent_column, e))?;
        references.push(SpanRef {
            trace_id,
            span_id: parent,
            ref_type: RefType::ChildOf,
        });
    }

    references.extend(map_links(
        schema.column(Field::Links),
        record,
        diagnostics,
    ));

    let timestamp_column = schema.column(Field::Timestamp);
    let start_time = location
        .parse(record.require(timestamp_column)?)
        .map_err(|e| MappingError::invalid(timestamp_column, e))?;

    let duration_column = schema.column(Field::Duration);
    let micros: u64 = record
        .require(duration_column)?
        .trim()
        .parse()
        .map_err(|e| MappingError::invalid(duration_column, e))?;
    let duration = Duration::from_micros(micros);

    let mut tags = map_attributes(
        schema.column(Field::SpanAttributes),
        record,
        diagnostics,
    );

    let kind_column = schema.column(Field::SpanKind);
    match record.get(kind_column) {
        Some(kind) => match kinds.to_jaeger(kind) {
            Some(jaeger) => tags.push(KeyValue::string(SPAN_KIND_TAG, jaeger)),
            None => diagnostics.warn(kind_column, &format!("unknown span kind `{}`", kind)),
        },
        None => diagnostics.warn(kind_column, "missing span kind"),
    }

    let message_column = schema.column(Field::StatusMessage);
    match record.get(message_column) {
        Some(message) => tags.push(KeyValue::string(STATUS_DESCRIPTION_TAG, message)),
        None => diagnostics.warn(message_column, "missing status message"),
    }

    let code_column = schema.column(Field::StatusCode);
    match record.get(code_column) {
        Some(code) => {
            tags.push(KeyValue::string(STATUS_CODE_TAG, code));
            if code == STATUS_CODE_ERROR {
                tags.push(KeyValue::bool(ERROR_TAG, true));
            }
        }
        None => diagnostics.warn(code_column, "missing status code"),
    }

    let logs = map_events(
        schema.column(Field::Events),
        location,
        record,
        diagnostics,
    );

    let service_name = record
        .require(schema.column(Field::ServiceName))?
        .to_string();
    let process = Process {
        service_name,
        tags: map_attributes(
            schema.column(Field::ResourceAttributes),
            record,
            diagnostics,
        ),
    };

    Ok(Span {
        trace_id,
        span_id,
        operation_name,
        references,
        start_time,
        duration,
        tags,
        logs,
        process,
    })
}

/// Build a [`DependencyLink`] from one row of the graph query
pub fn map_dependency_link(
    graph: &GraphSchemaMapping,
    record: &Record,
) -> Result<DependencyLink, MappingError> {
    let parent = record
        .require(graph.column(GraphField::CallerServiceName))?
        .to_string();
    let child = record
        .require(graph.column(GraphField::CalleeServiceName))?
        .to_string();

    let count_column = graph.column(GraphField::Count);
    let call_count = record
        .require(count_column)?
        .trim()
        .parse::<u64>()
        .map_err(|e| MappingError::invalid(count_column, e))?;

    Ok(DependencyLink {
        parent,
        child,
        call_count,
    })
}

/// Follows-from references; bad entries are skipped one by one
fn map_links(column: &str, record: &Record, diagnostics: &dyn Diagnostics) -> Vec<SpanRef> {
    let raw = record.get_or_empty(column);
    if raw.is_empty() {
        return Vec::new();
    }

    let links: Vec<Link> = match serde_json::from_str(raw) {
        Ok(links) => links,
        Err(e) => {
            diagnostics.warn(column, &format!("failed to unmarshal links: {}", e));
            return Vec::new();
        }
    };

    links
        .into_iter()
        .filter_map(|link| {
            let trace_id = match link.trace_id.parse::<TraceId>() {
                Ok(id) => id,
                Err(e) => {
                    diagnostics.warn(column, &format!("failed to parse trace_id of link: {}", e));
                    return None;
                }
            };
            let span_id = match link.span_id.parse::<SpanId>() {
                Ok(id) => id,
                Err(e) => {
                    diagnostics.warn(column, &format!("failed to parse span_id of link: {}", e));
                    return None;
                }
            };
            Some(SpanRef {
                trace_id,
                span_id,
                ref_type: RefType::FollowsFrom,
            })
        })
        .collect()
}

/// Key/values of a JSON object column, in stored order
fn map_attributes(column: &str, record: &Record, diagnostics: &dyn Diagnostics) -> Vec<KeyValue> {
    let raw = record.get_or_empty(column);
    if raw.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Map<String, JsonValue>>(raw) {
        Ok(attributes) => attributes
            .into_iter()
            .map(|(key, value)| json_to_key_value(key, value))
            .collect(),
        Err(e) => {
            diagnostics.warn(column, &format!("failed to unmarshal attributes: {}", e));
            Vec::new()
        }
    }
}

fn map_events(
    column: &str,
    location: &Location,
    record: &Record,
    diagnostics: &dyn Diagnostics,
) -> Vec<Log> {
    let raw = record.get_or_empty(column);
    if raw.is_empty() {
        return Vec::new();
    }

    let events: Vec<Event> = match serde_json::from_str(raw) {
        Ok(events) => events,
        Err(e) => {
            diagnostics.warn(column, &format!("failed to unmarshal events: {}", e));
            return Vec::new();
        }
    };

    events
        .into_iter()
        .filter_map(|event| {
            let timestamp = match location.parse(&event.timestamp) {
                Ok(t) => t,
                Err(e) => {
                    diagnostics.warn(column, &format!("failed to parse timestamp of event: {}", e));
                    return None;
                }
            };
            let mut fields = Vec::with_capacity(event.attributes.len() + 1);
            fields.push(KeyValue::string(EVENT_FIELD, event.name));
            fields.extend(
                event
                    .attributes
                    .into_iter()
                    .map(|(key, value)| json_to_key_value(key, value)),
            );
            Some(Log { timestamp, fields })
        })
        .collect()
}

/// bool, integer, float and string keep their type; anything else is stored
/// as its JSON text. Integers above `i64::MAX` have no Jaeger type and keep
/// their exact digits as a string.
pub fn json_to_key_value(key: String, value: JsonValue) -> KeyValue {
    match value {
        JsonValue::Bool(b) => KeyValue::bool(key, b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                KeyValue::int64(key, i)
            } else if n.is_u64() {
                KeyValue::string(key, n.to_string())
            } else {
                KeyValue::float64(key, n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => KeyValue::string(key, s),
        other => KeyValue::string(key, other.to_string()),
    }
}
