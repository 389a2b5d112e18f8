use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod identifier;
pub mod location;
pub mod schema;

pub use identifier::{is_valid_identifier, InvalidIdentifier, TableName};
pub use location::{InvalidTimezone, Location, TimestampError, TIME_FORMAT};
pub use schema::{Field, GraphField, GraphSchemaMapping, SchemaMapping};

/// Environment variable prefix, e.g. `JAEGER_DORIS_DORIS__TABLE=traces`
pub const ENV_PREFIX: &str = "JAEGER_DORIS";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// gRPC service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Doris connection and schema configuration
    #[serde(default)]
    pub doris: DorisConfig,
}

/// Configuration of the gRPC plugin service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen address
    #[serde(default = "default_ip")]
    pub ip: String,

    /// gRPC listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP port for the `/metrics` endpoint
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Default log filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-query timeout in seconds, 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of spans per streamed response chunk
    #[serde(default = "default_span_batch_size")]
    pub span_batch_size: usize,

    /// Seconds to wait for in-flight requests on shutdown before forcing it
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Configuration for the Doris (MySQL protocol) backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DorisConfig {
    /// `host:port` of the Doris FE MySQL endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Span table
    #[serde(default = "default_table")]
    pub table: String,

    /// Dependency graph table
    #[serde(default = "default_graph_table")]
    pub graph_table: String,

    /// IANA timezone of the stored `DATETIME` values, empty for local time
    #[serde(default)]
    pub timezone: String,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Check connectivity with a ping before serving
    #[serde(default = "default_ping_on_startup")]
    pub ping_on_startup: bool,

    /// How far before the hour-aligned earliest match the span fetch may scan
    #[serde(default = "default_partition_hint_margin_secs")]
    pub partition_hint_margin_secs: u64,

    /// String tags longer than this are truncated before being returned
    #[serde(default = "default_max_tag_value_length")]
    pub max_tag_value_length: usize,

    #[serde(default)]
    pub schema_mapping: SchemaMapping,

    #[serde(default)]
    pub graph_schema_mapping: GraphSchemaMapping,
}

// Default value functions
fn default_ip() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_metrics_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_span_batch_size() -> usize {
    1000
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_endpoint() -> String {
    "localhost:9030".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_database() -> String {
    "otel".to_string()
}

fn default_table() -> String {
    "traces".to_string()
}

fn default_graph_table() -> String {
    "traces_graph".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_ping_on_startup() -> bool {
    true
}

fn default_partition_hint_margin_secs() -> u64 {
    3600
}

fn default_max_tag_value_length() -> usize {
    1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
            timeout_secs: default_timeout_secs(),
            span_batch_size: default_span_batch_size(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for DorisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: default_username(),
            password: String::new(),
            database: default_database(),
            table: default_table(),
            graph_table: default_graph_table(),
            timezone: String::new(),
            max_connections: default_max_connections(),
            ping_on_startup: default_ping_on_startup(),
            partition_hint_margin_secs: default_partition_hint_margin_secs(),
            max_tag_value_length: default_max_tag_value_length(),
            schema_mapping: SchemaMapping::with_defaults(),
            graph_schema_mapping: GraphSchemaMapping::with_defaults(),
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. Configuration file (if provided; format chosen by extension)
    /// 3. Environment variables (`JAEGER_DORIS_` prefix, `__` between levels)
    ///
    /// Schema mappings are default-filled after deserialization, so a file
    /// only needs to name the columns that differ from the canonical ones.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // Service defaults
            .set_default("service.ip", default_ip())?
            .set_default("service.port", default_port())?
            .set_default("service.metrics_port", default_metrics_port())?
            .set_default("service.log_level", default_log_level())?
            .set_default("service.timeout_secs", default_timeout_secs())?
            .set_default("service.span_batch_size", default_span_batch_size() as u64)?
            .set_default("service.shutdown_grace_secs", default_shutdown_grace_secs())?
            // Doris defaults
            .set_default("doris.endpoint", default_endpoint())?
            .set_default("doris.username", default_username())?
            .set_default("doris.password", "")?
            .set_default("doris.database", default_database())?
            .set_default("doris.table", default_table())?
            .set_default("doris.graph_table", default_graph_table())?
            .set_default("doris.timezone", "")?
            .set_default("doris.max_connections", default_max_connections())?
            .set_default("doris.ping_on_startup", default_ping_on_startup())?
            .set_default(
                "doris.partition_hint_margin_secs",
                default_partition_hint_margin_secs(),
            )?
            .set_default(
                "doris.max_tag_value_length",
                default_max_tag_value_length() as u64,
            )?;

        if let Some(path) = config_file {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut app_config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.doris.schema_mapping.fill_default_values();
        app_config.doris.graph_schema_mapping.fill_default_values();

        Ok(app_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.service.validate()?;
        self.doris.validate()?;
        Ok(())
    }
}

impl ServiceConfig {
    /// gRPC listen address, e.g. `localhost:5000`
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.ip, self.metrics_port)
    }

    /// Configured query timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.ip.is_empty(), "service ip cannot be empty");
        anyhow::ensure!(
            self.span_batch_size > 0,
            "service span_batch_size must be greater than 0"
        );
        Ok(())
    }
}

impl DorisConfig {
    /// Host and port of `endpoint`; a missing port means the FE query port 9030
    pub fn host_port(&self) -> Result<(&str, u16)> {
        const DEFAULT_PORT: u16 = 9030;
        match self.endpoint.rsplit_once(':') {
            Some((host, port)) => {
                anyhow::ensure!(!host.is_empty(), "Doris endpoint has no host: {}", self.endpoint);
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("Invalid port in Doris endpoint {}", self.endpoint))?;
                Ok((host, port))
            }
            None => Ok((self.endpoint.as_str(), DEFAULT_PORT)),
        }
    }

    /// Fully qualified span table, e.g. `otel.traces`
    pub fn table_name(&self) -> Result<TableName> {
        TableName::new(&self.database, &self.table).context("Invalid span table name")
    }

    /// Fully qualified dependency graph table
    pub fn graph_table_name(&self) -> Result<TableName> {
        TableName::new(&self.database, &self.graph_table)
            .context("Invalid dependency graph table name")
    }

    pub fn location(&self) -> Result<Location> {
        Location::from_name(&self.timezone).context("Invalid timezone")
    }

    pub fn partition_hint_margin(&self) -> Duration {
        Duration::from_secs(self.partition_hint_margin_secs)
    }

    /// Validate the Doris configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.endpoint.is_empty(), "Doris endpoint cannot be empty");
        self.host_port()?;
        anyhow::ensure!(
            self.max_connections > 0,
            "Doris max_connections must be greater than 0"
        );
        anyhow::ensure!(
            self.max_tag_value_length > 3,
            "Doris max_tag_value_length must be greater than 3"
        );
        self.table_name()?;
        self.graph_table_name()?;
        self.location()?;
        Ok(())
    }
}
