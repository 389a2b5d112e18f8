use crate::batch::batch;
use crate::convert;
use crate::deadline::request_deadline;
use crate::error::{QuerierError, Result};
use crate::grpc::health::v1::health_server::HealthServer;
use crate::health::HealthService;
use crate::jaeger::storage::v1::archive_span_reader_plugin_server::{
    ArchiveSpanReaderPlugin, ArchiveSpanReaderPluginServer,
};
use crate::jaeger::storage::v1::archive_span_writer_plugin_server::{
    ArchiveSpanWriterPlugin, ArchiveSpanWriterPluginServer,
};
use crate::jaeger::storage::v1::dependencies_reader_plugin_server::{
    DependenciesReaderPlugin, DependenciesReaderPluginServer,
};
use crate::jaeger::storage::v1::plugin_capabilities_server::{
    PluginCapabilities, PluginCapabilitiesServer,
};
use crate::jaeger::storage::v1::span_reader_plugin_server::{
    SpanReaderPlugin, SpanReaderPluginServer,
};
use crate::jaeger::storage::v1::span_writer_plugin_server::{
    SpanWriterPlugin, SpanWriterPluginServer,
};
use crate::jaeger::storage::v1::streaming_span_writer_plugin_server::{
    StreamingSpanWriterPlugin, StreamingSpanWriterPluginServer,
};
use crate::jaeger::storage::v1::{
    CapabilitiesRequest, CapabilitiesResponse, CloseWriterRequest, CloseWriterResponse,
    FindTraceIDsRequest, FindTraceIDsResponse, FindTracesRequest, GetDependenciesRequest,
    GetDependenciesResponse, GetOperationsRequest, GetOperationsResponse, GetServicesRequest,
    GetServicesResponse, GetTraceRequest, SpansResponseChunk, WriteSpanRequest,
    WriteSpanResponse,
};
use crate::metrics::QuerierMetrics;
use model::{OperationQueryParameters, Trace};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use storage::{sanitize_trace, RequestContext, SpanReader, StorageError};
use tokio::time::Instant;
use tokio_stream::Stream;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

type SpanStream = Pin<Box<dyn Stream<Item = std::result::Result<SpansResponseChunk, Status>> + Send>>;

/// Jaeger remote storage plugin backed by a [`SpanReader`]
///
/// Only the read side is served. Writer and archive methods answer
/// `Unimplemented` and capabilities report nothing optional.
#[derive(Clone)]
pub struct JaegerStorageService {
    reader: Arc<SpanReader>,
    metrics: Arc<QuerierMetrics>,
    span_batch_size: usize,
    max_tag_value_length: usize,
}

impl JaegerStorageService {
    pub fn new(
        reader: Arc<SpanReader>,
        metrics: Arc<QuerierMetrics>,
        span_batch_size: usize,
        max_tag_value_length: usize,
    ) -> Self {
        Self {
            reader,
            metrics,
            span_batch_size,
            max_tag_value_length,
        }
    }

    /// Run a request body, recording its outcome in the metrics
    async fn instrument<T, F>(&self, operation: &'static str, body: F) -> std::result::Result<T, Status>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        self.metrics
            .requests_total
            .with_label_values(&[operation])
            .inc();

        let result = body.await;

        let is_error = match &result {
            Ok(_) => "false",
            // a missing trace is an answer, not a failure
            Err(QuerierError::Storage(StorageError::TraceNotFound)) => "false",
            Err(e) => {
                self.metrics
                    .request_errors_total
                    .with_label_values(&[operation])
                    .inc();
                tracing::error!(operation, error = %e, "Request failed");
                "true"
            }
        };
        self.metrics
            .request_duration_seconds
            .with_label_values(&[operation, is_error])
            .observe(started.elapsed().as_secs_f64());

        result.map_err(Status::from)
    }

    /// Sanitize and convert traces, then split every trace into chunks of at
    /// most `span_batch_size` spans
    fn chunks(&self, operation: &'static str, traces: Vec<Trace>) -> Vec<SpansResponseChunk> {
        let mut chunks = Vec::new();
        let mut num_spans = 0;
        for mut trace in traces {
            sanitize_trace(&mut trace, self.max_tag_value_length);
            num_spans += trace.spans.len();
            let spans = trace.spans.into_iter().map(convert::span_to_proto).collect();
            chunks.extend(
                batch(spans, self.span_batch_size)
                    .into_iter()
                    .map(|spans| SpansResponseChunk { spans }),
            );
        }
        self.metrics
            .retrieved_spans_total
            .with_label_values(&[operation])
            .inc_by(num_spans as u64);
        chunks
    }

    fn stream(chunks: Vec<SpansResponseChunk>) -> SpanStream {
        Box::pin(tokio_stream::iter(chunks.into_iter().map(Ok)))
    }

    async fn get_trace_inner(
        &self,
        request: Request<GetTraceRequest>,
    ) -> Result<Vec<SpansResponseChunk>> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let trace_id = convert::trace_id_from_proto(&request.get_ref().trace_id)?;

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let trace = self.reader.get_trace(ctx, trace_id).await?;
        Ok(self.chunks("get_trace", vec![trace]))
    }

    async fn get_services_inner(
        &self,
        request: Request<GetServicesRequest>,
    ) -> Result<GetServicesResponse> {
        let deadline = request_deadline(request.metadata(), Instant::now());

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let services = self.reader.get_services(ctx).await?;
        tracing::debug!(count = services.len(), "Services found");
        Ok(GetServicesResponse { services })
    }

    async fn get_operations_inner(
        &self,
        request: Request<GetOperationsRequest>,
    ) -> Result<GetOperationsResponse> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let request = request.into_inner();
        let params = OperationQueryParameters {
            service_name: request.service,
            span_kind: Some(request.span_kind).filter(|kind| !kind.is_empty()),
        };

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let operations = self.reader.get_operations(ctx, &params).await?;
        Ok(GetOperationsResponse {
            operation_names: Vec::new(),
            operations: operations
                .into_iter()
                .map(convert::operation_to_proto)
                .collect(),
        })
    }

    async fn find_traces_inner(
        &self,
        request: Request<FindTracesRequest>,
    ) -> Result<Vec<SpansResponseChunk>> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let params = convert::trace_query_from_proto(request.into_inner().query)?;

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let traces = self.reader.find_traces(ctx, &params).await?;
        tracing::debug!(count = traces.len(), "Traces found");
        Ok(self.chunks("find_traces", traces))
    }

    async fn find_trace_ids_inner(
        &self,
        request: Request<FindTraceIDsRequest>,
    ) -> Result<FindTraceIDsResponse> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let params = convert::trace_query_from_proto(request.into_inner().query)?;

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let trace_ids = self.reader.find_trace_ids(ctx, &params).await?;
        Ok(FindTraceIDsResponse {
            trace_ids: trace_ids
                .into_iter()
                .map(|id| id.to_bytes().to_vec())
                .collect(),
        })
    }

    async fn get_dependencies_inner(
        &self,
        request: Request<GetDependenciesRequest>,
    ) -> Result<GetDependenciesResponse> {
        let deadline = request_deadline(request.metadata(), Instant::now());
        let request = request.into_inner();

        let start = request
            .start_time
            .as_ref()
            .ok_or_else(|| QuerierError::InvalidArgument("missing start_time".to_string()))
            .and_then(convert::timestamp_from_proto)?;
        let end = request
            .end_time
            .as_ref()
            .ok_or_else(|| QuerierError::InvalidArgument("missing end_time".to_string()))
            .and_then(convert::timestamp_from_proto)?;
        let lookback = (end - start).to_std().map_err(|_| {
            QuerierError::InvalidArgument(format!("start_time {} is after end_time {}", start, end))
        })?;

        let diagnostics = self.metrics.diagnostics();
        let ctx = RequestContext::new(&diagnostics).with_deadline(deadline);
        let links = self.reader.get_dependencies(ctx, end, lookback).await?;
        Ok(GetDependenciesResponse {
            dependencies: links
                .into_iter()
                .map(convert::dependency_link_to_proto)
                .collect(),
        })
    }
}

#[tonic::async_trait]
impl SpanReaderPlugin for JaegerStorageService {
    type GetTraceStream = SpanStream;

    type FindTracesStream = SpanStream;

    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr()))]
    async fn get_trace(
        &self,
        request: Request<GetTraceRequest>,
    ) -> std::result::Result<Response<Self::GetTraceStream>, Status> {
        let chunks = self
            .instrument("get_trace", self.get_trace_inner(request))
            .await?;
        Ok(Response::new(Self::stream(chunks)))
    }

    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr()))]
    async fn get_services(
        &self,
        request: Request<GetServicesRequest>,
    ) -> std::result::Result<Response<GetServicesResponse>, Status> {
        self.instrument("get_services", self.get_services_inner(request))
            .await
            .map(Response::new)
    }

    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr(), service = %request.get_ref().service))]
    async fn get_operations(
        &self,
        request: Request<GetOperationsRequest>,
    ) -> std::result::Result<Response<GetOperationsResponse>, Status> {
        self.instrument("get_operations", self.get_operations_inner(request))
            .await
            .map(Response::new)
    }

    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr()))]
    async fn find_traces(
        &self,
        request: Request<FindTracesRequest>,
    ) -> std::result::Result<Response<Self::FindTracesStream>, Status> {
        let chunks = self
            .instrument("find_traces", self.find_traces_inner(request))
            .await?;
        Ok(Response::new(Self::stream(chunks)))
    }

    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr()))]
    async fn find_trace_i_ds(
        &self,
        request: Request<FindTraceIDsRequest>,
    ) -> std::result::Result<Response<FindTraceIDsResponse>, Status> {
        self.instrument("find_trace_ids", self.find_trace_ids_inner(request))
            .await
            .map(Response::new)
    }
}

#[tonic::async_trait]
impl DependenciesReaderPlugin for JaegerStorageService {
    #[tracing::instrument(skip(self, request), fields(remote_addr = ?request.remote_addr()))]
    async fn get_dependencies(
        &self,
        request: Request<GetDependenciesRequest>,
    ) -> std::result::Result<Response<GetDependenciesResponse>, Status> {
        self.instrument("get_dependencies", self.get_dependencies_inner(request))
            .await
            .map(Response::new)
    }
}

#[tonic::async_trait]
impl PluginCapabilities for JaegerStorageService {
    async fn capabilities(
        &self,
        _request: Request<CapabilitiesRequest>,
    ) -> std::result::Result<Response<CapabilitiesResponse>, Status> {
        Ok(Response::new(CapabilitiesResponse {
            archive_span_reader: false,
            archive_span_writer: false,
            streaming_span_writer: false,
        }))
    }
}

#[tonic::async_trait]
impl SpanWriterPlugin for JaegerStorageService {
    async fn write_span(
        &self,
        _request: Request<WriteSpanRequest>,
    ) -> std::result::Result<Response<WriteSpanResponse>, Status> {
        tracing::debug!("write_span called on a read-only plugin");
        Err(Status::unimplemented("not implemented"))
    }

    async fn close(
        &self,
        _request: Request<CloseWriterRequest>,
    ) -> std::result::Result<Response<CloseWriterResponse>, Status> {
        Err(Status::unimplemented(
            "span writer does not support graceful shutdown",
        ))
    }
}

#[tonic::async_trait]
impl StreamingSpanWriterPlugin for JaegerStorageService {
    async fn write_span_stream(
        &self,
        _request: Request<Streaming<WriteSpanRequest>>,
    ) -> std::result::Result<Response<WriteSpanResponse>, Status> {
        tracing::debug!("write_span_stream called on a read-only plugin");
        Err(Status::unimplemented("not implemented"))
    }
}

#[tonic::async_trait]
impl ArchiveSpanReaderPlugin for JaegerStorageService {
    type GetArchiveTraceStream = SpanStream;

    async fn get_archive_trace(
        &self,
        _request: Request<GetTraceRequest>,
    ) -> std::result::Result<Response<Self::GetArchiveTraceStream>, Status> {
        tracing::debug!("get_archive_trace called without an archive store");
        Err(Status::unimplemented("not implemented"))
    }
}

#[tonic::async_trait]
impl ArchiveSpanWriterPlugin for JaegerStorageService {
    async fn write_archive_span(
        &self,
        _request: Request<WriteSpanRequest>,
    ) -> std::result::Result<Response<WriteSpanResponse>, Status> {
        tracing::debug!("write_archive_span called without an archive store");
        Err(Status::unimplemented("not implemented"))
    }
}

/// gRPC router serving every plugin service plus health checking and
/// server reflection
pub fn build_router(
    service: JaegerStorageService,
    health: HealthService,
) -> std::result::Result<Router, tonic_reflection::server::Error> {
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(crate::STORAGE_DESCRIPTOR_SET)
        .register_encoded_file_descriptor_set(crate::HEALTH_DESCRIPTOR_SET)
        .build_v1()?;

    Ok(Server::builder()
        .add_service(SpanReaderPluginServer::new(service.clone()))
        .add_service(SpanWriterPluginServer::new(service.clone()))
        .add_service(StreamingSpanWriterPluginServer::new(service.clone()))
        .add_service(ArchiveSpanReaderPluginServer::new(service.clone()))
        .add_service(ArchiveSpanWriterPluginServer::new(service.clone()))
        .add_service(DependenciesReaderPluginServer::new(service.clone()))
        .add_service(PluginCapabilitiesServer::new(service))
        .add_service(HealthServer::new(health))
        .add_service(reflection))
}
