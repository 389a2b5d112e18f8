//! Conversions between the domain model and the Jaeger protobuf messages

use crate::error::{QuerierError, Result};
use crate::jaeger::api_v2 as pb;
use crate::jaeger::storage::v1 as storage_pb;
use chrono::{DateTime, Utc};
use model::{
    DependencyLink, KeyValue, Log, Operation, Process, RefType, Span, SpanRef, TraceId,
    TraceQueryParameters, Value,
};
use std::time::Duration;

pub fn timestamp_to_proto(t: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: t.timestamp(),
        nanos: t.timestamp_subsec_nanos() as i32,
    }
}

pub fn timestamp_from_proto(t: &prost_types::Timestamp) -> Result<DateTime<Utc>> {
    let nanos = u32::try_from(t.nanos)
        .map_err(|_| QuerierError::InvalidArgument(format!("negative nanos in {:?}", t)))?;
    DateTime::from_timestamp(t.seconds, nanos)
        .ok_or_else(|| QuerierError::InvalidArgument(format!("timestamp out of range: {:?}", t)))
}

pub fn duration_to_proto(d: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: d.as_secs() as i64,
        nanos: d.subsec_nanos() as i32,
    }
}

pub fn duration_from_proto(d: &prost_types::Duration) -> Result<Duration> {
    Duration::try_from(d.clone())
        .map_err(|e| QuerierError::InvalidArgument(format!("invalid duration {:?}: {}", d, e)))
}

pub fn trace_id_from_proto(bytes: &[u8]) -> Result<TraceId> {
    TraceId::from_bytes(bytes)
        .map_err(|e| QuerierError::InvalidArgument(format!("invalid trace id: {}", e)))
}

pub fn trace_query_from_proto(
    query: Option<storage_pb::TraceQueryParameters>,
) -> Result<TraceQueryParameters> {
    let query =
        query.ok_or_else(|| QuerierError::InvalidArgument("missing query".to_string()))?;

    let num_traces = u32::try_from(query.num_traces).map_err(|_| {
        QuerierError::InvalidArgument(format!("negative num_traces {}", query.num_traces))
    })?;

    Ok(TraceQueryParameters {
        service_name: query.service_name,
        operation_name: query.operation_name,
        tags: query.tags.into_iter().collect(),
        start_time_min: query
            .start_time_min
            .as_ref()
            .map(timestamp_from_proto)
            .transpose()?,
        start_time_max: query
            .start_time_max
            .as_ref()
            .map(timestamp_from_proto)
            .transpose()?,
        duration_min: query
            .duration_min
            .as_ref()
            .map(duration_from_proto)
            .transpose()?,
        duration_max: query
            .duration_max
            .as_ref()
            .map(duration_from_proto)
            .transpose()?,
        num_traces,
    })
}

fn key_value_to_proto(kv: KeyValue) -> pb::KeyValue {
    let mut out = pb::KeyValue {
        key: kv.key,
        ..Default::default()
    };
    match kv.value {
        Value::Str(s) => {
            out.v_type = pb::ValueType::String as i32;
            out.v_str = s;
        }
        Value::Bool(b) => {
            out.v_type = pb::ValueType::Bool as i32;
            out.v_bool = b;
        }
        Value::Int64(i) => {
            out.v_type = pb::ValueType::Int64 as i32;
            out.v_int64 = i;
        }
        Value::Float64(f) => {
            out.v_type = pb::ValueType::Float64 as i32;
            out.v_float64 = f;
        }
    }
    out
}

fn span_ref_to_proto(r: SpanRef) -> pb::SpanRef {
    pb::SpanRef {
        trace_id: r.trace_id.to_bytes().to_vec(),
        span_id: r.span_id.to_bytes().to_vec(),
        ref_type: match r.ref_type {
            RefType::ChildOf => pb::SpanRefType::ChildOf as i32,
            RefType::FollowsFrom => pb::SpanRefType::FollowsFrom as i32,
        },
    }
}

fn log_to_proto(log: Log) -> pb::Log {
    pb::Log {
        timestamp: Some(timestamp_to_proto(log.timestamp)),
        fields: log.fields.into_iter().map(key_value_to_proto).collect(),
    }
}

fn process_to_proto(process: Process) -> pb::Process {
    pb::Process {
        service_name: process.service_name,
        tags: process.tags.into_iter().map(key_value_to_proto).collect(),
    }
}

pub fn span_to_proto(span: Span) -> pb::Span {
    pb::Span {
        trace_id: span.trace_id.to_bytes().to_vec(),
        span_id: span.span_id.to_bytes().to_vec(),
        operation_name: span.operation_name,
        references: span.references.into_iter().map(span_ref_to_proto).collect(),
        flags: 0,
        start_time: Some(timestamp_to_proto(span.start_time)),
        duration: Some(duration_to_proto(span.duration)),
        tags: span.tags.into_iter().map(key_value_to_proto).collect(),
        logs: span.logs.into_iter().map(log_to_proto).collect(),
        process: Some(process_to_proto(span.process)),
        process_id: String::new(),
        warnings: Vec::new(),
    }
}

pub fn dependency_link_to_proto(link: DependencyLink) -> pb::DependencyLink {
    pb::DependencyLink {
        parent: link.parent,
        child: link.child,
        call_count: link.call_count,
        source: String::new(),
    }
}

pub fn operation_to_proto(operation: Operation) -> storage_pb::Operation {
    storage_pb::Operation {
        name: operation.name,
        span_kind: operation.span_kind,
    }
}
