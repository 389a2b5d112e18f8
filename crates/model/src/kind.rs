//! Translation between OpenTelemetry span kinds and Jaeger `span.kind` values

use std::collections::HashMap;

pub const SPAN_KIND_INTERNAL: &str = "SPAN_KIND_INTERNAL";
pub const SPAN_KIND_SERVER: &str = "SPAN_KIND_SERVER";
pub const SPAN_KIND_CLIENT: &str = "SPAN_KIND_CLIENT";
pub const SPAN_KIND_PRODUCER: &str = "SPAN_KIND_PRODUCER";
pub const SPAN_KIND_CONSUMER: &str = "SPAN_KIND_CONSUMER";

/// Jaeger tag key holding the span kind
pub const SPAN_KIND_TAG: &str = "span.kind";

/// Bidirectional OTel <-> Jaeger span kind table
///
/// Built once at startup and passed to the query builder and the row mapper.
#[derive(Debug, Clone)]
pub struct SpanKindTable {
    otel_to_jaeger: HashMap<&'static str, &'static str>,
    jaeger_to_otel: HashMap<&'static str, &'static str>,
}

impl SpanKindTable {
    pub fn new() -> Self {
        let pairs = [
            (SPAN_KIND_INTERNAL, "internal"),
            (SPAN_KIND_SERVER, "server"),
            (SPAN_KIND_CLIENT, "client"),
            (SPAN_KIND_PRODUCER, "producer"),
            (SPAN_KIND_CONSUMER, "consumer"),
        ];

        Self {
            otel_to_jaeger: pairs.iter().copied().collect(),
            jaeger_to_otel: pairs.iter().map(|(otel, jaeger)| (*jaeger, *otel)).collect(),
        }
    }

    /// `SPAN_KIND_SERVER` -> `server`
    pub fn to_jaeger(&self, otel_kind: &str) -> Option<&'static str> {
        self.otel_to_jaeger.get(otel_kind).copied()
    }

    /// `server` -> `SPAN_KIND_SERVER`
    pub fn to_otel(&self, jaeger_kind: &str) -> Option<&'static str> {
        self.jaeger_to_otel.get(jaeger_kind).copied()
    }
}

impl Default for SpanKindTable {
    fn default() -> Self {
        Self::new()
    }
}
