//! ETH/USD price aggregation service.
//!
//! Polls every configured price adapter, folds the answers into per-source slices plus a
//! consensus mean, and serves the resulting state over HTTP.
//!
//! Configuration comes from `PULSE_*` environment variables; see
//! [`PulseConfig`](pulse_runtime::config::PulseConfig).

use anyhow::Context;
use pulse_core::EventBus;
use pulse_core::environment::HttpClient;
use pulse_drivers::{PollingDriver, ReqwestHttpClient, WarmupDriver};
use pulse_runtime::config::PulseConfig;
use pulse_runtime::metrics::MetricsRecorder;
use pulse_runtime::{BroadcastEventBus, Runtime};
use pulse_web::{AppState, router};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pulse_aggregator=info,pulse_runtime=info,pulse_drivers=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pulse aggregator");

    let config = PulseConfig::from_env().context("Invalid configuration")?;
    info!(
        sources = ?config.modules.sources,
        adapter_base_url = %config.modules.adapter_base_url,
        api_addr = %config.api.addr,
        "Configuration loaded"
    );

    let mut metrics = MetricsRecorder::new();
    if config.api.metrics_enabled {
        metrics.install().context("Failed to install metrics recorder")?;
    }

    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::new(config.http.timeout()).context("Failed to build HTTP client")?,
    );
    let (runtime, drivers) = start_runtime(&config, http)?;

    let app = router(AppState::new(Arc::clone(&runtime)).with_metrics(metrics.handle().cloned()));
    let listener = tokio::net::TcpListener::bind(config.api.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.addr))?;
    info!(address = %config.api.addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown().await?;
    for driver in drivers {
        if let Err(e) = driver.await {
            error!(error = %e, "Driver task failed");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Build the bus and runtime, install the modules, spawn both drivers and start the loop.
///
/// Drivers subscribe before `start` so they see the start-triggered polling requests.
fn start_runtime(
    config: &PulseConfig,
    http: Arc<dyn HttpClient>,
) -> anyhow::Result<(Arc<Runtime>, [JoinHandle<()>; 2])> {
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new(config.runtime.bus_capacity));
    let runtime = Arc::new(Runtime::new(Arc::clone(&bus)));

    pulse_modules::install_all(&runtime, &config.modules);
    info!(modules = config.modules.sources.len() + 1, "Modules registered");

    let drivers = [
        PollingDriver::new(Arc::clone(&bus), Arc::clone(&http), &config.polling).spawn()?,
        WarmupDriver::new(bus, http, runtime.state_handle()).spawn()?,
    ];
    runtime.start()?;
    info!("Runtime started");

    Ok((runtime, drivers))
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
