// Proto modules
pub mod jaeger {
    pub mod api_v2 {
        tonic::include_proto!("jaeger.api_v2");
    }
    pub mod storage {
        pub mod v1 {
            tonic::include_proto!("jaeger.storage.v1");
        }
    }
}

pub mod grpc {
    pub mod health {
        pub mod v1 {
            tonic::include_proto!("grpc.health.v1");
        }
    }
}

/// Encoded descriptors of the served protos, for server reflection
pub const STORAGE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("storage_descriptor");
pub const HEALTH_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("health_descriptor");

// Public modules
pub mod batch;
pub mod convert;
pub mod deadline;
pub mod error;
pub mod handler;
pub mod health;
pub mod http;
pub mod metrics;

// Re-exports for convenience
pub use error::{QuerierError, Result};
pub use handler::JaegerStorageService;
pub use health::HealthService;
pub use metrics::QuerierMetrics;
