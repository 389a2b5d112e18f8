use querier::jaeger::storage::v1::dependencies_reader_plugin_client::DependenciesReaderPluginClient;
use querier::jaeger::storage::v1::plugin_capabilities_client::PluginCapabilitiesClient;
use querier::jaeger::storage::v1::span_writer_plugin_client::SpanWriterPluginClient;
use querier::jaeger::storage::v1::{
    CapabilitiesRequest, FindTraceIDsRequest, FindTracesRequest, GetDependenciesRequest,
    GetOperationsRequest, GetServicesRequest, GetTraceRequest, SpansResponseChunk,
    TraceQueryParameters, WriteSpanRequest,
};
use std::sync::Arc;
use storage::{CollectingDiagnostics, RequestContext, SpanReader};
use test_each_file::test_each_file;
use tests::{rows_from_json, settings, span_row, MemoryTable, TestServer};
use model::{SpanKindTable, TraceId};
use tonic::Code;

const TRACE_A: &str = "0000000000000000000000000000000a";
const TRACE_B: &str = "0000000000000000000000000000000b";
const TRACE_C: &str = "0000000000000000000000000000000c";

fn trace_id_bytes(hex: &str) -> Vec<u8> {
    hex.parse::<TraceId>().unwrap().to_bytes().to_vec()
}

/// Three traces: A (3 spans) and B (1 span) from `frontend`, C (1 span) from
/// `backend`. B starts last.
fn table() -> MemoryTable {
    MemoryTable::new(vec![
        span_row(TRACE_A, "0000000000000001", "frontend", "2024-01-01 10:00:00.000000"),
        span_row(TRACE_A, "0000000000000002", "frontend", "2024-01-01 10:00:00.100000"),
        span_row(TRACE_A, "0000000000000003", "frontend", "2024-01-01 10:00:00.200000"),
        span_row(TRACE_B, "0000000000000004", "frontend", "2024-01-01 11:00:00.000000"),
        span_row(TRACE_C, "0000000000000005", "backend", "2024-01-01 10:30:00.000000"),
    ])
}

async fn collect(
    stream: tonic::Streaming<SpansResponseChunk>,
) -> Vec<SpansResponseChunk> {
    use tokio_stream::StreamExt;
    stream
        .collect::<Result<Vec<_>, tonic::Status>>()
        .await
        .expect("stream failed")
}

test_each_file! { #[tokio::test] async for ["json"] in "./crates/tests/rows" => test_row_fixture }

async fn test_row_fixture([input]: [&str; 1]) {
    let fixture: serde_json::Value = serde_json::from_str(input).expect("invalid fixture");
    let expected = |key: &str| fixture[key].as_u64().map(|n| n as usize);

    let runner = Arc::new(MemoryTable::new(rows_from_json(&fixture["rows"])));
    let reader = SpanReader::new(runner, settings(), SpanKindTable::new());
    let diagnostics = CollectingDiagnostics::new();

    let trace_id: TraceId = fixture["trace_id"].as_str().unwrap().parse().unwrap();
    let trace = reader
        .get_trace(RequestContext::new(&diagnostics), trace_id)
        .await
        .expect("trace should be found");

    assert_eq!(Some(trace.spans.len()), expected("spans"));
    assert_eq!(Some(diagnostics.dropped().len()), expected("dropped"));
    assert_eq!(
        Some(diagnostics.warnings().len()),
        expected("warnings"),
        "warnings: {:?}",
        diagnostics.warnings()
    );
    if let Some(references) = expected("references") {
        let total: usize = trace.spans.iter().map(|s| s.references.len()).sum();
        assert_eq!(total, references);
    }
    if let Some(logs) = expected("logs") {
        let total: usize = trace.spans.iter().map(|s| s.logs.len()).sum();
        assert_eq!(total, logs);
    }
}

#[tokio::test]
async fn test_get_trace_streams_batches() {
    let server = TestServer::start(Arc::new(table()), 2).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let stream = client
        .get_trace(GetTraceRequest {
            trace_id: trace_id_bytes(TRACE_A),
            start_time: None,
            end_time: None,
        })
        .await
        .unwrap()
        .into_inner();
    let chunks = collect(stream).await;

    let sizes: Vec<usize> = chunks.iter().map(|c| c.spans.len()).collect();
    assert_eq!(sizes, vec![2, 1]);
    for span in chunks.iter().flat_map(|c| &c.spans) {
        assert_eq!(span.trace_id, trace_id_bytes(TRACE_A));
        assert_eq!(span.process.as_ref().unwrap().service_name, "frontend");
        assert!(span.tags.iter().any(|t| t.key == "span.kind" && t.v_str == "server"));
    }
}

#[tokio::test]
async fn test_get_trace_not_found() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let status = client
        .get_trace(GetTraceRequest {
            trace_id: trace_id_bytes("000000000000000000000000000000ff"),
            start_time: None,
            end_time: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_find_traces_keeps_traces_apart() {
    let runner = Arc::new(table());
    let server = TestServer::start(runner.clone(), 2).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let stream = client
        .find_traces(FindTracesRequest {
            query: Some(TraceQueryParameters {
                service_name: "frontend".to_string(),
                num_traces: 20,
                ..Default::default()
            }),
        })
        .await
        .unwrap()
        .into_inner();
    let chunks = collect(stream).await;

    // newest trace first, and no chunk mixes traces
    let per_chunk: Vec<(Vec<u8>, usize)> = chunks
        .iter()
        .map(|c| {
            let trace_id = c.spans[0].trace_id.clone();
            assert!(c.spans.iter().all(|s| s.trace_id == trace_id));
            (trace_id, c.spans.len())
        })
        .collect();
    assert_eq!(
        per_chunk,
        vec![
            (trace_id_bytes(TRACE_B), 1),
            (trace_id_bytes(TRACE_A), 2),
            (trace_id_bytes(TRACE_A), 1),
        ]
    );

    let queries = runner.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[1].contains("timestamp >= '2024-01-01 09:00:00.000000'"));
}

#[tokio::test]
async fn test_find_traces_honors_limit() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let stream = client
        .find_traces(FindTracesRequest {
            query: Some(TraceQueryParameters {
                num_traces: 1,
                ..Default::default()
            }),
        })
        .await
        .unwrap()
        .into_inner();
    let chunks = collect(stream).await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].spans[0].trace_id, trace_id_bytes(TRACE_B));
}

#[tokio::test]
async fn test_find_traces_without_query_is_rejected() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let status = client
        .find_traces(FindTracesRequest { query: None })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_find_trace_ids() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let response = client
        .find_trace_i_ds(FindTraceIDsRequest {
            query: Some(TraceQueryParameters {
                service_name: "frontend".to_string(),
                num_traces: 20,
                ..Default::default()
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        response.trace_ids,
        vec![trace_id_bytes(TRACE_B), trace_id_bytes(TRACE_A)]
    );
}

#[tokio::test]
async fn test_services_and_operations() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    let services = client
        .get_services(GetServicesRequest {})
        .await
        .unwrap()
        .into_inner()
        .services;
    assert_eq!(services, vec!["backend", "frontend"]);

    let operations = client
        .get_operations(GetOperationsRequest {
            service: "backend".to_string(),
            span_kind: String::new(),
        })
        .await
        .unwrap()
        .into_inner()
        .operations;
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].name, "GET /api");
    assert_eq!(operations[0].span_kind, "server");
}

#[tokio::test]
async fn test_get_dependencies() {
    let graph = vec![
        [
            ("caller_service_name", "frontend"),
            ("callee_service_name", "backend"),
            ("count", "42"),
        ]
        .into_iter()
        .collect(),
        [
            ("caller_service_name", "backend"),
            ("callee_service_name", "db"),
            ("count", "not a number"),
        ]
        .into_iter()
        .collect(),
    ];
    let runner = Arc::new(table().with_graph(graph));
    let server = TestServer::start(runner, 10).await.unwrap();
    let mut client = DependenciesReaderPluginClient::new(server.channel().await.unwrap());

    let response = client
        .get_dependencies(GetDependenciesRequest {
            start_time: Some(prost_types::Timestamp {
                seconds: 1704067200,
                nanos: 0,
            }),
            end_time: Some(prost_types::Timestamp {
                seconds: 1704153600,
                nanos: 0,
            }),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.dependencies.len(), 1);
    assert_eq!(response.dependencies[0].parent, "frontend");
    assert_eq!(response.dependencies[0].child, "backend");
    assert_eq!(response.dependencies[0].call_count, 42);

    assert_eq!(server.metrics.dropped_rows_total.get(), 1);
}

#[tokio::test]
async fn test_capabilities_and_writes() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let channel = server.channel().await.unwrap();

    let capabilities = PluginCapabilitiesClient::new(channel.clone())
        .capabilities(CapabilitiesRequest {})
        .await
        .unwrap()
        .into_inner();
    assert!(!capabilities.archive_span_reader);
    assert!(!capabilities.archive_span_writer);
    assert!(!capabilities.streaming_span_writer);

    let status = SpanWriterPluginClient::new(channel)
        .write_span(WriteSpanRequest { span: None })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);
}

#[tokio::test]
async fn test_metrics_follow_requests() {
    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = server.reader_client().await.unwrap();

    client
        .get_trace(GetTraceRequest {
            trace_id: trace_id_bytes(TRACE_A),
            start_time: None,
            end_time: None,
        })
        .await
        .unwrap();
    let _ = client
        .get_operations(GetOperationsRequest {
            service: "frontend".to_string(),
            span_kind: "sideways".to_string(),
        })
        .await;

    let metrics = &server.metrics;
    assert_eq!(metrics.requests_total.with_label_values(&["get_trace"]).get(), 1);
    assert_eq!(
        metrics.retrieved_spans_total.with_label_values(&["get_trace"]).get(),
        3
    );
    assert_eq!(
        metrics.request_errors_total.with_label_values(&["get_operations"]).get(),
        1
    );
}

#[tokio::test]
async fn test_reflection_lists_services() {
    use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
    use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
    use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
    use tonic_reflection::pb::v1::ServerReflectionRequest;

    let server = TestServer::start(Arc::new(table()), 10).await.unwrap();
    let mut client = ServerReflectionClient::new(server.channel().await.unwrap());

    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let mut responses = client
        .server_reflection_info(tokio_stream::iter(vec![request]))
        .await
        .unwrap()
        .into_inner();
    let response = responses.message().await.unwrap().expect("no reflection response");

    let Some(MessageResponse::ListServicesResponse(list)) = response.message_response else {
        panic!("unexpected reflection response: {:?}", response.message_response);
    };
    let names: Vec<&str> = list.service.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"jaeger.storage.v1.SpanReaderPlugin"), "{:?}", names);
    assert!(names.contains(&"grpc.health.v1.Health"), "{:?}", names);
}
