use crate::diagnostics::Diagnostics;
use crate::error::{Result, StorageError};
use crate::executor::QueryRunner;
use crate::mapper::{map_dependency_link, SpanMapping};
use chrono::{DateTime, Utc};
use config::{DorisConfig, Field, GraphSchemaMapping, Location, SchemaMapping, TableName};
use model::{
    DependencyLink, Operation, OperationQueryParameters, SpanKindTable, Trace, TraceId,
    TraceQueryParameters,
};
use queries::builder;
use queries::{PartitionHint, EARLIEST_START_ALIAS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Static inputs of every query: where the data is and how it is laid out
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub schema: SchemaMapping,
    pub graph_schema: GraphSchemaMapping,
    pub table: TableName,
    pub graph_table: TableName,
    pub location: Location,
    pub partition_hint_margin: Duration,
}

impl ReaderSettings {
    pub fn from_config(config: &DorisConfig) -> anyhow::Result<Self> {
        Ok(Self {
            schema: config.schema_mapping.clone(),
            graph_schema: config.graph_schema_mapping.clone(),
            table: config.table_name()?,
            graph_table: config.graph_table_name()?,
            location: config.location()?,
            partition_hint_margin: config.partition_hint_margin(),
        })
    }
}

/// Per-request inputs: the caller's deadline and where warnings go
#[derive(Clone, Copy)]
pub struct RequestContext<'a> {
    pub deadline: Option<Instant>,
    pub diagnostics: &'a dyn Diagnostics,
}

impl<'a> RequestContext<'a> {
    pub fn new(diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            deadline: None,
            diagnostics,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Read side of the span store
///
/// Each operation builds its SQL, runs it through the [`QueryRunner`] and maps
/// the rows. Rows that cannot be mapped are reported and skipped; only query
/// failures fail an operation.
pub struct SpanReader {
    runner: Arc<dyn QueryRunner>,
    settings: ReaderSettings,
    kinds: SpanKindTable,
}

impl SpanReader {
    pub fn new(runner: Arc<dyn QueryRunner>, settings: ReaderSettings, kinds: SpanKindTable) -> Self {
        Self {
            runner,
            settings,
            kinds,
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    fn span_mapping(&self) -> SpanMapping<'_> {
        SpanMapping {
            schema: &self.settings.schema,
            location: &self.settings.location,
            kinds: &self.kinds,
        }
    }

    /// All spans of one trace; [`StorageError::TraceNotFound`] when none map
    pub async fn get_trace(&self, ctx: RequestContext<'_>, trace_id: TraceId) -> Result<Trace> {
        let sql = builder::get_trace(
            &self.settings.schema,
            &self.settings.table,
            &trace_id.to_string(),
        );
        let mapping = self.span_mapping();

        let mut trace = Trace::default();
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                match mapping.map(&record, ctx.diagnostics) {
                    Ok(span) => trace.spans.push(span),
                    Err(e) => ctx.diagnostics.row_dropped(&e),
                }
                Ok(())
            })
            .await?;

        if trace.is_empty() {
            return Err(StorageError::TraceNotFound);
        }
        Ok(trace)
    }

    pub async fn get_services(&self, ctx: RequestContext<'_>) -> Result<Vec<String>> {
        let sql = builder::get_services(&self.settings.schema, &self.settings.table);
        let column = self.settings.schema.column(Field::ServiceName);

        let mut services = Vec::new();
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                let service = record.get_or_empty(column);
                if !service.is_empty() {
                    services.push(service.to_string());
                }
                Ok(())
            })
            .await?;
        Ok(services)
    }

    pub async fn get_operations(
        &self,
        ctx: RequestContext<'_>,
        params: &OperationQueryParameters,
    ) -> Result<Vec<Operation>> {
        let schema = &self.settings.schema;
        let sql = builder::get_operations(schema, &self.settings.table, params, &self.kinds)?;
        let name_column = schema.column(Field::SpanName);
        let kind_column = schema.column(Field::SpanKind);
        let kinds = &self.kinds;

        let mut operations = Vec::new();
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                let name = record.get_or_empty(name_column);
                if !name.is_empty() {
                    operations.push(Operation {
                        name: name.to_string(),
                        span_kind: kinds
                            .to_jaeger(record.get_or_empty(kind_column))
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
                Ok(())
            })
            .await?;
        Ok(operations)
    }

    /// Traces matching the parameters, newest first
    ///
    /// Runs two queries: trace id discovery, then one fetch of every span of
    /// the discovered traces. Traces whose spans all failed to map are left
    /// out.
    pub async fn find_traces(
        &self,
        ctx: RequestContext<'_>,
        params: &TraceQueryParameters,
    ) -> Result<Vec<Trace>> {
        let (trace_ids, earliest) = self.discover_trace_ids(ctx, params).await?;
        if trace_ids.is_empty() {
            return Ok(Vec::new());
        }

        let hint = earliest.map(|earliest| PartitionHint {
            earliest,
            margin: self.settings.partition_hint_margin,
        });
        let sql = builder::find_traces(
            &self.settings.schema,
            &self.settings.table,
            &trace_ids,
            hint.as_ref(),
            &self.settings.location,
        )?;

        let index: HashMap<&str, usize> = trace_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut buckets = vec![Trace::default(); trace_ids.len()];
        let trace_id_column = self.settings.schema.column(Field::TraceId);
        let mapping = self.span_mapping();

        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                match mapping.map(&record, ctx.diagnostics) {
                    Ok(span) => match index.get(record.get_or_empty(trace_id_column)) {
                        Some(&i) => buckets[i].spans.push(span),
                        None => ctx
                            .diagnostics
                            .warn(trace_id_column, "row belongs to a trace that was not requested"),
                    },
                    Err(e) => ctx.diagnostics.row_dropped(&e),
                }
                Ok(())
            })
            .await?;

        Ok(buckets.into_iter().filter(|t| !t.is_empty()).collect())
    }

    /// Phase one of `find_traces`: raw trace id strings in result order plus
    /// the earliest start time among them, when it could be read
    async fn discover_trace_ids(
        &self,
        ctx: RequestContext<'_>,
        params: &TraceQueryParameters,
    ) -> Result<(Vec<String>, Option<DateTime<Utc>>)> {
        let sql = builder::find_trace_ids(
            &self.settings.schema,
            &self.settings.table,
            params,
            &self.settings.location,
        );
        let trace_id_column = self.settings.schema.column(Field::TraceId);
        let location = &self.settings.location;

        let mut trace_ids = Vec::new();
        let mut earliest: Option<DateTime<Utc>> = None;
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                let trace_id = record
                    .get(trace_id_column)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        StorageError::InvalidTraceId(format!(
                            "row has no `{}` value",
                            trace_id_column
                        ))
                    })?;
                trace_ids.push(trace_id.to_string());

                if let Some(t) = record.get(EARLIEST_START_ALIAS) {
                    match location.parse(t) {
                        Ok(t) => earliest = Some(earliest.map_or(t, |e| e.min(t))),
                        Err(e) => ctx.diagnostics.warn(EARLIEST_START_ALIAS, &e.to_string()),
                    }
                }
                Ok(())
            })
            .await?;

        Ok((trace_ids, earliest))
    }

    /// Trace ids matching the parameters, newest first
    pub async fn find_trace_ids(
        &self,
        ctx: RequestContext<'_>,
        params: &TraceQueryParameters,
    ) -> Result<Vec<TraceId>> {
        let sql = builder::find_trace_ids(
            &self.settings.schema,
            &self.settings.table,
            params,
            &self.settings.location,
        );
        let trace_id_column = self.settings.schema.column(Field::TraceId);

        let mut trace_ids = Vec::new();
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                trace_ids.push(record.get_or_empty(trace_id_column).parse::<TraceId>()?);
                Ok(())
            })
            .await?;
        Ok(trace_ids)
    }

    /// Service call counts within `[end - lookback, end]`
    pub async fn get_dependencies(
        &self,
        ctx: RequestContext<'_>,
        end: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Vec<DependencyLink>> {
        let graph = &self.settings.graph_schema;
        let sql = builder::get_dependencies(
            graph,
            &self.settings.graph_table,
            end,
            lookback,
            &self.settings.location,
        )?;

        let mut links = Vec::new();
        self.runner
            .execute(&sql, ctx.deadline, &mut |record| {
                match map_dependency_link(graph, &record) {
                    Ok(link) => links.push(link),
                    Err(e) => ctx.diagnostics.row_dropped(&e),
                }
                Ok(())
            })
            .await?;
        Ok(links)
    }
}
