/// SQL builders for the read paths
///
/// Every function is pure: schema mapping + table + parameters in, SQL text
/// out. Column names come from the schema mapping, table names are validated
/// `TableName`s and user values only appear inside quoted literals.
use crate::literal;
use crate::{QueryError, Result};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use config::location::format_naive;
use config::{Field, GraphField, GraphSchemaMapping, Location, SchemaMapping, TableName};
use model::tags::{ERROR_MESSAGE_ATTRIBUTE, ERROR_TAG, STATUS_CODE_ERROR};
use model::{OperationQueryParameters, SpanKindTable, TraceQueryParameters};
use std::fmt::Write;
use std::time::Duration;

/// Alias of the per-trace earliest start time in the trace id discovery query
pub const EARLIEST_START_ALIAS: &str = "t";

/// Earliest start time among the discovered traces, used to narrow the span
/// fetch to the partitions that can hold matching rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionHint {
    pub earliest: DateTime<Utc>,
    /// Extra distance scanned before the hour-aligned `earliest`
    pub margin: Duration,
}

impl PartitionHint {
    /// Lower bound of the scan: `earliest` floored to its hour in `location`,
    /// minus the margin
    pub fn floor(&self, location: &Location) -> Result<NaiveDateTime> {
        let local = location.to_naive(self.earliest);
        let hour = local
            .date()
            .and_hms_opt(local.hour(), 0, 0)
            .ok_or_else(|| QueryError::InvalidTime(format!("cannot floor {}", local)))?;
        let margin = chrono::Duration::from_std(self.margin)
            .map_err(|e| QueryError::InvalidTime(format!("partition margin: {}", e)))?;
        hour.checked_sub_signed(margin)
            .ok_or_else(|| QueryError::InvalidTime(format!("{} minus {:?}", hour, self.margin)))
    }
}

/// `SELECT * FROM <table> WHERE <trace_id> = "<id>"`
pub fn get_trace(schema: &SchemaMapping, table: &TableName, trace_id: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        table,
        schema.column(Field::TraceId),
        literal::double(trace_id),
    )
}

/// Distinct service names
pub fn get_services(schema: &SchemaMapping, table: &TableName) -> String {
    let service = schema.column(Field::ServiceName);
    format!("SELECT {} FROM {} GROUP BY {}", service, table, service)
}

/// Distinct (operation, kind) pairs of a service, optionally of a single kind
pub fn get_operations(
    schema: &SchemaMapping,
    table: &TableName,
    params: &OperationQueryParameters,
    kinds: &SpanKindTable,
) -> Result<String> {
    let span_name = schema.column(Field::SpanName);
    let span_kind = schema.column(Field::SpanKind);

    let mut sql = String::new();
    write!(
        &mut sql,
        "SELECT {}, {} FROM {} WHERE {} = {}",
        span_name,
        span_kind,
        table,
        schema.column(Field::ServiceName),
        literal::double(&params.service_name),
    )?;

    if let Some(kind) = params.span_kind.as_deref().filter(|k| !k.is_empty()) {
        let otel_kind = kinds
            .to_otel(kind)
            .ok_or_else(|| QueryError::UnknownSpanKind(kind.to_string()))?;
        write!(&mut sql, " AND {} = {}", span_kind, literal::double(otel_kind))?;
    }

    write!(&mut sql, " GROUP BY {}, {}", span_name, span_kind)?;
    Ok(sql)
}

/// Predicates of the trace id discovery query, in a fixed order: tags (by
/// key), service, operation, start time bounds, duration bounds
pub fn find_trace_ids_predicates(
    schema: &SchemaMapping,
    params: &TraceQueryParameters,
    location: &Location,
) -> Vec<String> {
    let tags = schema.column(Field::SpanAttributes);
    let timestamp = schema.column(Field::Timestamp);
    let duration = schema.column(Field::Duration);

    let mut predicates = Vec::with_capacity(params.tags.len() + 6);

    for (key, value) in &params.tags {
        // Compatibility shim: some exporters never write an `error` attribute,
        // failed spans carry `error.msg` or an error status code instead.
        // Keep until the ingestion side emits `error` itself.
        if key == ERROR_TAG && value == "true" {
            predicates.push(format!(
                "(({}[{}] IS NOT NULL) OR ({} == {}))",
                tags,
                literal::single(ERROR_MESSAGE_ATTRIBUTE),
                schema.column(Field::StatusCode),
                literal::double(STATUS_CODE_ERROR),
            ));
        } else {
            predicates.push(format!(
                "{}[{}] = {}",
                tags,
                literal::single(key),
                literal::single(value)
            ));
        }
    }

    if !params.service_name.is_empty() {
        predicates.push(format!(
            "{} = {}",
            schema.column(Field::ServiceName),
            literal::single(&params.service_name)
        ));
    }

    if !params.operation_name.is_empty() {
        predicates.push(format!(
            "{} = {}",
            schema.column(Field::SpanName),
            literal::single(&params.operation_name)
        ));
    }

    if let Some(min) = params.start_time_min {
        predicates.push(format!("{} >= '{}'", timestamp, location.format(min)));
    }

    if let Some(max) = params.start_time_max {
        predicates.push(format!("{} <= '{}'", timestamp, location.format(max)));
    }

    if let Some(min) = params.duration_min.filter(|d| !d.is_zero()) {
        predicates.push(format!("{} >= {}", duration, min.as_micros()));
    }

    if let Some(max) = params.duration_max.filter(|d| !d.is_zero()) {
        predicates.push(format!("{} <= {}", duration, max.as_micros()));
    }

    predicates
}

/// Newest `num_traces` trace ids matching the parameters, each with its
/// earliest start time as `t`
pub fn find_trace_ids(
    schema: &SchemaMapping,
    table: &TableName,
    params: &TraceQueryParameters,
    location: &Location,
) -> String {
    let trace_id = schema.column(Field::TraceId);
    let predicates = find_trace_ids_predicates(schema, params, location);

    let mut sql = format!(
        "SELECT {}, MIN({}) AS {} FROM {}",
        trace_id,
        schema.column(Field::Timestamp),
        EARLIEST_START_ALIAS,
        table,
    );

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    sql.push_str(&format!(
        " GROUP BY {} ORDER BY {} DESC LIMIT {}",
        trace_id, EARLIEST_START_ALIAS, params.num_traces
    ));
    sql
}

/// All spans of the given traces
///
/// The partition hint only adds a coarse lower bound on the start time; it
/// never excludes a row of the requested traces as long as the hint is the
/// earliest start among them.
pub fn find_traces(
    schema: &SchemaMapping,
    table: &TableName,
    trace_ids: &[String],
    hint: Option<&PartitionHint>,
    location: &Location,
) -> Result<String> {
    if trace_ids.is_empty() {
        return Err(QueryError::EmptyTraceIds);
    }

    let mut sql = String::new();
    write!(&mut sql, "SELECT * FROM {} WHERE ", table)?;

    if let Some(hint) = hint {
        write!(
            &mut sql,
            "{} >= '{}' AND ",
            schema.column(Field::Timestamp),
            format_naive(hint.floor(location)?)
        )?;
    }

    let ids = trace_ids
        .iter()
        .map(|id| literal::single(id))
        .collect::<Vec<_>>()
        .join(",");
    write!(&mut sql, "{} IN ({})", schema.column(Field::TraceId), ids)?;
    Ok(sql)
}

/// Call counts between services within `[end - lookback, end]`
pub fn get_dependencies(
    graph: &GraphSchemaMapping,
    table: &TableName,
    end: DateTime<Utc>,
    lookback: Duration,
    location: &Location,
) -> Result<String> {
    let lookback = chrono::Duration::from_std(lookback)
        .map_err(|e| QueryError::InvalidTime(format!("lookback: {}", e)))?;
    let start = end
        .checked_sub_signed(lookback)
        .ok_or_else(|| QueryError::InvalidTime(format!("{} minus {}", end, lookback)))?;

    let caller = graph.column(GraphField::CallerServiceName);
    let callee = graph.column(GraphField::CalleeServiceName);
    let count = graph.column(GraphField::Count);
    let timestamp = graph.column(GraphField::Timestamp);

    let mut sql = String::new();
    writeln!(&mut sql, "select")?;
    writeln!(&mut sql, "{}, {}, sum({}) as {}", caller, callee, count, count)?;
    writeln!(&mut sql, "from {}", table)?;
    writeln!(&mut sql, "where {} >= '{}'", timestamp, location.format(start))?;
    writeln!(&mut sql, "and {} <= '{}'", timestamp, location.format(end))?;
    write!(&mut sql, "group by {}, {}", caller, callee)?;
    Ok(sql)
}
