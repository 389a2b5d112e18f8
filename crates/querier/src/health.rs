//! `grpc.health.v1.Health`, reporting every registered plugin as serving

use crate::grpc::health::v1::health_check_response::ServingStatus;
use crate::grpc::health::v1::health_server::Health;
use crate::grpc::health::v1::{HealthCheckRequest, HealthCheckResponse};
use std::collections::HashSet;
use std::pin::Pin;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

/// Fully qualified names of the services this binary registers
pub const SERVICE_NAMES: [&str; 7] = [
    "jaeger.storage.v1.SpanReaderPlugin",
    "jaeger.storage.v1.SpanWriterPlugin",
    "jaeger.storage.v1.ArchiveSpanReaderPlugin",
    "jaeger.storage.v1.ArchiveSpanWriterPlugin",
    "jaeger.storage.v1.PluginCapabilities",
    "jaeger.storage.v1.DependenciesReaderPlugin",
    "jaeger.storage.v1.StreamingSpanWriterPlugin",
];

#[derive(Debug, Clone)]
pub struct HealthService {
    serving: HashSet<String>,
}

impl HealthService {
    pub fn new<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            serving: services.into_iter().map(Into::into).collect(),
        }
    }

    /// The empty name asks about the server as a whole
    fn status(&self, service: &str) -> Option<ServingStatus> {
        (service.is_empty() || self.serving.contains(service)).then_some(ServingStatus::Serving)
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new(SERVICE_NAMES)
    }
}

type HealthStream = Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send>>;

#[tonic::async_trait]
impl Health for HealthService {
    type WatchStream = HealthStream;

    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = request.into_inner().service;
        match self.status(&service) {
            Some(status) => Ok(Response::new(HealthCheckResponse {
                status: status as i32,
            })),
            None => Err(Status::not_found(format!("unknown service `{}`", service))),
        }
    }

    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let service = request.into_inner().service;
        let status = self.status(&service).unwrap_or(ServingStatus::ServiceUnknown);
        let stream = tokio_stream::once(Ok(HealthCheckResponse {
            status: status as i32,
        }));
        Ok(Response::new(Box::pin(stream)))
    }
}
