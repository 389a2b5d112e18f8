use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use model::{SpanKindTable, TraceId, TraceQueryParameters};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{RequestContext, SpanReader, TracingDiagnostics};
use tests::{settings, span_row, MemoryTable};
use tokio::runtime::Runtime;

const TRACE_ID: &str = "0000000000000001000000000000000a";

/// Build a span table holding one trace of `spans` spans
fn table(spans: usize) -> MemoryTable {
    MemoryTable::new(
        (0..spans)
            .map(|i| {
                let mut row = span_row(
                    TRACE_ID,
                    &format!("{:016x}", i + 1),
                    "frontend",
                    "2024-01-01 10:00:00.000000",
                );
                row.insert(
                    "span_attributes",
                    r#"{"http.method":"GET","http.status_code":200,"http.url":"https://example.com/api/v1/items?page=3","retry":false,"latency":0.25}"#,
                );
                row.insert(
                    "events",
                    r#"[{"timestamp":"2024-01-01 10:00:00.000100","name":"cache miss","attributes":{"key":"items:3"}}]"#,
                );
                row
            })
            .collect(),
    )
}

fn bench_get_trace(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let trace_id: TraceId = TRACE_ID.parse().unwrap();

    let mut group = c.benchmark_group("get_trace");
    group.measurement_time(Duration::from_secs(10));

    for spans in [100, 1000, 10000] {
        let reader = SpanReader::new(Arc::new(table(spans)), settings(), SpanKindTable::new());
        group.throughput(Throughput::Elements(spans as u64));
        group.bench_with_input(BenchmarkId::from_parameter(spans), &reader, |b, reader| {
            b.iter(|| {
                rt.block_on(async {
                    let trace = reader
                        .get_trace(RequestContext::new(&TracingDiagnostics), trace_id)
                        .await
                        .unwrap();
                    assert_eq!(trace.spans.len(), spans);
                })
            });
        });
    }

    group.finish();
}

fn bench_build_find_traces(c: &mut Criterion) {
    let settings = settings();
    let params = TraceQueryParameters {
        service_name: "frontend".to_string(),
        operation_name: "GET /api".to_string(),
        tags: BTreeMap::from([
            ("http.status_code".to_string(), "200".to_string()),
            ("error".to_string(), "true".to_string()),
        ]),
        duration_min: Some(Duration::from_millis(5)),
        num_traces: 20,
        ..Default::default()
    };
    let trace_ids: Vec<String> = (0..20).map(|i| format!("{:032x}", i)).collect();

    c.bench_function("build_find_trace_ids", |b| {
        b.iter(|| {
            queries::builder::find_trace_ids(
                &settings.schema,
                &settings.table,
                &params,
                &settings.location,
            )
        })
    });

    c.bench_function("build_find_traces", |b| {
        b.iter(|| {
            queries::builder::find_traces(
                &settings.schema,
                &settings.table,
                &trace_ids,
                None,
                &settings.location,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_get_trace, bench_build_find_traces);
criterion_main!(benches);
