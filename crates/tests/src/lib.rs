use async_trait::async_trait;
use config::{GraphSchemaMapping, Location, SchemaMapping, TableName};
use model::SpanKindTable;
use querier::handler::build_router;
use querier::jaeger::storage::v1::span_reader_plugin_client::SpanReaderPluginClient;
use querier::{HealthService, JaegerStorageService, QuerierMetrics};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{QueryRunner, ReaderSettings, Record, RowCallback, SpanReader};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;

pub const DATABASE: &str = "otel";
pub const TABLE: &str = "traces";
pub const GRAPH_TABLE: &str = "traces_graph";

/// In-memory stand-in for Doris holding one span table and one graph table
///
/// It recognises the statement shapes the reader issues and evaluates only
/// the trace id, service and limit parts of them. Other predicates are
/// ignored, so tests choose rows that match by construction.
#[derive(Default)]
pub struct MemoryTable {
    spans: Vec<Record>,
    graph: Vec<Record>,
    queries: Mutex<Vec<String>>,
}

impl MemoryTable {
    pub fn new(spans: Vec<Record>) -> Self {
        Self {
            spans,
            ..Default::default()
        }
    }

    pub fn with_graph(mut self, graph: Vec<Record>) -> Self {
        self.graph = graph;
        self
    }

    /// Statements received so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn answer(&self, sql: &str) -> Vec<Record> {
        if sql.contains(&format!("{}.{}", DATABASE, GRAPH_TABLE)) {
            return self.graph.clone();
        }
        if let Some(id) = quoted_after(sql, "trace_id = \"") {
            return self.spans_where(|trace_id| trace_id == id);
        }
        if let Some(list) = between(sql, "trace_id IN (", ")") {
            let ids: BTreeSet<&str> = list.split(',').map(|id| id.trim().trim_matches('\'')).collect();
            return self.spans_where(|trace_id| ids.contains(trace_id));
        }
        if sql.contains("MIN(") {
            return self.trace_starts(sql);
        }
        if sql.contains("GROUP BY span_name") {
            return self.operations(quoted_after(sql, "service_name = \"").unwrap_or_default());
        }
        if sql.contains("GROUP BY service_name") {
            let services: BTreeSet<&str> = self
                .spans
                .iter()
                .filter_map(|row| row.get("service_name"))
                .collect();
            return services
                .into_iter()
                .map(|service| [("service_name", service)].into_iter().collect())
                .collect();
        }
        Vec::new()
    }

    fn spans_where(&self, keep: impl Fn(&str) -> bool) -> Vec<Record> {
        self.spans
            .iter()
            .filter(|row| row.get("trace_id").is_some_and(&keep))
            .cloned()
            .collect()
    }

    fn trace_starts(&self, sql: &str) -> Vec<Record> {
        let service = between(sql, "service_name = '", "'");
        let mut starts: BTreeMap<&str, &str> = BTreeMap::new();
        for row in &self.spans {
            if service.is_some() && row.get("service_name") != service {
                continue;
            }
            let (Some(trace_id), Some(timestamp)) = (row.get("trace_id"), row.get("timestamp"))
            else {
                continue;
            };
            let start = starts.entry(trace_id).or_insert(timestamp);
            if timestamp < *start {
                *start = timestamp;
            }
        }

        let mut starts: Vec<_> = starts.into_iter().collect();
        starts.sort_by(|a, b| b.1.cmp(a.1));
        if let Some(limit) = sql
            .rsplit_once("LIMIT ")
            .and_then(|(_, limit)| limit.trim().parse::<usize>().ok())
        {
            starts.truncate(limit);
        }
        starts
            .into_iter()
            .map(|(trace_id, t)| [("trace_id", trace_id), ("t", t)].into_iter().collect())
            .collect()
    }

    fn operations(&self, service: &str) -> Vec<Record> {
        let operations: BTreeSet<(&str, &str)> = self
            .spans
            .iter()
            .filter(|row| row.get("service_name") == Some(service))
            .filter_map(|row| Some((row.get("span_name")?, row.get("span_kind").unwrap_or(""))))
            .collect();
        operations
            .into_iter()
            .map(|(name, kind)| [("span_name", name), ("span_kind", kind)].into_iter().collect())
            .collect()
    }
}

fn quoted_after<'a>(sql: &'a str, prefix: &str) -> Option<&'a str> {
    between(sql, prefix, "\"")
}

fn between<'a>(sql: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let rest = &sql[sql.find(start)? + start.len()..];
    Some(&rest[..rest.find(end)?])
}

#[async_trait]
impl QueryRunner for MemoryTable {
    async fn execute(
        &self,
        sql: &str,
        _deadline: Option<Instant>,
        on_row: &mut RowCallback<'_>,
    ) -> storage::Result<()> {
        self.queries.lock().unwrap().push(sql.to_string());
        for row in self.answer(sql) {
            on_row(row)?;
        }
        Ok(())
    }
}

/// Reader settings matching [`MemoryTable`]'s table names, with UTC timestamps
pub fn settings() -> ReaderSettings {
    ReaderSettings {
        schema: SchemaMapping::with_defaults(),
        graph_schema: GraphSchemaMapping::with_defaults(),
        table: TableName::new(DATABASE, TABLE).unwrap(),
        graph_table: TableName::new(DATABASE, GRAPH_TABLE).unwrap(),
        location: Location::Zone(chrono_tz::UTC),
        partition_hint_margin: Duration::from_secs(3600),
    }
}

pub fn service(
    runner: Arc<dyn QueryRunner>,
    span_batch_size: usize,
) -> (JaegerStorageService, Arc<QuerierMetrics>) {
    let reader = SpanReader::new(runner, settings(), SpanKindTable::new());
    let metrics = Arc::new(QuerierMetrics::new().unwrap());
    let service = JaegerStorageService::new(Arc::new(reader), metrics.clone(), span_batch_size, 1024);
    (service, metrics)
}

/// A fully populated span row
pub fn span_row(trace_id: &str, span_id: &str, service: &str, timestamp: &str) -> Record {
    [
        ("trace_id", trace_id),
        ("span_id", span_id),
        ("parent_span_id", ""),
        ("span_name", "GET /api"),
        ("timestamp", timestamp),
        ("duration", "1500"),
        ("service_name", service),
        ("span_kind", "SPAN_KIND_SERVER"),
        ("status_code", "STATUS_CODE_UNSET"),
        ("status_message", ""),
        ("span_attributes", r#"{"http.method":"GET"}"#),
        ("resource_attributes", r#"{"host.name":"node-1"}"#),
        ("events", "[]"),
        ("links", "[]"),
    ]
    .into_iter()
    .collect()
}

/// Rows from a JSON array of objects; non-string values keep their JSON text
pub fn rows_from_json(rows: &serde_json::Value) -> Vec<Record> {
    rows.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(serde_json::Value::as_object)
                .map(|row| {
                    row.iter()
                        .map(|(column, value)| {
                            let value = match value {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (column.clone(), value)
                        })
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A plugin server on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
    pub metrics: Arc<QuerierMetrics>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(runner: Arc<dyn QueryRunner>, span_batch_size: usize) -> anyhow::Result<Self> {
        let (service, metrics) = service(runner, span_batch_size);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let router = build_router(service, HealthService::default())?;
        let handle = tokio::spawn(async move {
            if let Err(e) = router
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
            {
                eprintln!("test server failed: {}", e);
            }
        });

        Ok(Self {
            addr,
            metrics,
            handle,
        })
    }

    pub async fn channel(&self) -> anyhow::Result<Channel> {
        Ok(Channel::from_shared(format!("http://{}", self.addr))?
            .connect()
            .await?)
    }

    pub async fn reader_client(&self) -> anyhow::Result<SpanReaderPluginClient<Channel>> {
        Ok(SpanReaderPluginClient::new(self.channel().await?))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Row fixtures for the trace mapping tests
pub fn get_row_fixture_files() -> anyhow::Result<Vec<(String, PathBuf)>> {
    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rows");

    let mut fixtures = Vec::new();
    for entry in std::fs::read_dir(&fixtures_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            fixtures.push((name, path));
        }
    }

    fixtures.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_fixtures_exist() {
        let files = get_row_fixture_files().unwrap();
        assert!(!files.is_empty(), "Should find row fixtures");
    }

    #[test]
    fn test_memory_table_filters_by_trace() {
        let table = MemoryTable::new(vec![
            span_row("a", "1", "svc", "2024-01-01 00:00:00"),
            span_row("b", "2", "svc", "2024-01-01 00:00:01"),
        ]);
        let rows = table.answer(r#"SELECT * FROM otel.traces WHERE trace_id = "b""#);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("span_id"), Some("2"));

        let rows = table.answer("SELECT * FROM otel.traces WHERE trace_id IN ('a','b')");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_memory_table_trace_starts() {
        let table = MemoryTable::new(vec![
            span_row("a", "1", "svc", "2024-01-01 00:00:05"),
            span_row("a", "2", "svc", "2024-01-01 00:00:01"),
            span_row("b", "3", "svc", "2024-01-01 00:00:03"),
            span_row("c", "4", "other", "2024-01-01 00:00:09"),
        ]);
        let rows = table.answer(
            r#"SELECT trace_id, MIN(timestamp) AS t FROM otel.traces WHERE service_name = 'svc' GROUP BY trace_id ORDER BY t DESC LIMIT 20"#,
        );
        let starts: Vec<_> = rows
            .iter()
            .map(|r| (r.get("trace_id").unwrap(), r.get("t").unwrap()))
            .collect();
        assert_eq!(
            starts,
            vec![("b", "2024-01-01 00:00:03"), ("a", "2024-01-01 00:00:01")]
        );
    }
}
