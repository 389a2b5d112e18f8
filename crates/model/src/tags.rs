//! Well-known tag keys and values shared by the query builder and the mapper

/// Jaeger tag holding the OTel status description
pub const STATUS_DESCRIPTION_TAG: &str = "otel.status_description";

/// Jaeger tag holding the OTel status code
pub const STATUS_CODE_TAG: &str = "otel.status_code";

/// Boolean tag Jaeger uses to flag failed spans
pub const ERROR_TAG: &str = "error";

/// Attribute some exporters write instead of a literal `error` tag
pub const ERROR_MESSAGE_ATTRIBUTE: &str = "error.msg";

/// Stored status code of failed spans
pub const STATUS_CODE_ERROR: &str = "STATUS_CODE_ERROR";

/// First field of every log entry, carrying the OTel event name
pub const EVENT_FIELD: &str = "event";
