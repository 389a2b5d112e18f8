use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use model::SpanKindTable;
use querier::handler::build_router;
use querier::{http, HealthService, JaegerStorageService, QuerierMetrics};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storage::{DorisExecutor, ReaderSettings, SpanReader};
use tokio::sync::watch;

/// Jaeger remote storage backend reading spans from Apache Doris
#[derive(Parser, Debug)]
#[command(name = "jaeger-doris")]
#[command(about = "Jaeger remote storage gRPC plugin backed by Apache Doris", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    config.validate()?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.service.log_level))
                .context("Invalid log level")?,
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    let settings = ReaderSettings::from_config(&config.doris)?;
    let executor = Arc::new(
        DorisExecutor::connect_lazy(&config.doris, config.service.timeout())
            .context("Failed to create Doris connection pool")?,
    );
    if config.doris.ping_on_startup {
        executor
            .ping()
            .await
            .with_context(|| format!("Failed to reach Doris at {}", config.doris.endpoint))?;
        tracing::info!(endpoint = %config.doris.endpoint, "Connected to Doris");
    }
    let reader = Arc::new(SpanReader::new(
        executor.clone(),
        settings,
        SpanKindTable::new(),
    ));
    let metrics = Arc::new(QuerierMetrics::new().context("Failed to register metrics")?);
    let service = JaegerStorageService::new(
        reader,
        metrics.clone(),
        config.service.span_batch_size,
        config.doris.max_tag_value_length,
    );

    let grpc_addr: SocketAddr = config
        .service
        .address()
        .parse()
        .context("Invalid gRPC listen address")?;
    let metrics_addr = config.service.metrics_address();
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {}", metrics_addr))?;

    tracing::info!(
        grpc_address = %grpc_addr,
        metrics_address = %metrics_addr,
        doris = %config.doris.endpoint,
        table = %config.doris.table,
        timezone = %config.doris.timezone,
        "Starting jaeger-doris"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let router = build_router(service, HealthService::default())
        .context("Failed to build gRPC reflection service")?;
    let mut grpc_server =
        tokio::spawn(router.serve_with_shutdown(grpc_addr, stopped(shutdown_rx.clone())));
    let mut http_server = tokio::spawn(async move {
        axum::serve(metrics_listener, http::create_router(metrics).into_make_service())
            .with_graceful_shutdown(stopped(shutdown_rx))
            .await
    });

    tokio::select! {
        result = &mut grpc_server => {
            executor.close().await;
            result.context("gRPC server task failed")?.context("gRPC server error")?;
            return Ok(());
        }
        result = &mut http_server => {
            executor.close().await;
            result.context("Metrics server task failed")?.context("Metrics server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(config.service.shutdown_grace_secs);
    let drained = tokio::time::timeout(grace, async {
        if let Ok(Err(e)) = (&mut grpc_server).await {
            tracing::error!(error = %e, "gRPC server error");
        }
        if let Ok(Err(e)) = (&mut http_server).await {
            tracing::error!(error = %e, "Metrics server error");
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out, stopping");
        grpc_server.abort();
        http_server.abort();
    }

    executor.close().await;
    tracing::info!("jaeger-doris stopped");
    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
