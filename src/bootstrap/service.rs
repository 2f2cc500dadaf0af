use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, span, warn, Instrument, Level};

use crate::admin::AdminServer;
use crate::bridge::MqttBridge;
use crate::config::Config;
use crate::forwarder::{Forwarder, ForwarderConfig, HttpSender, ReportConsumer, ReportSummary};
use crate::telemetry::Stats;

use super::lifecycle::{Lifecycle, Phase};

/// Runtime options that do not come from the config file.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Upper bound on waiting for in-flight deliveries at shutdown
    pub drain_timeout: Duration,

    /// Bind address of the debug server, if enabled
    pub debug_address: Option<SocketAddr>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(5),
            debug_address: None,
        }
    }
}

/// The m2http service
///
/// Components:
/// - Forwarder: intake queue, retry/backoff, HTTP worker pool
/// - Report consumer: logs failed deliveries
/// - MQTT bridge: turns inbound messages into work items
/// - Debug server: health and counters, only with `--debug`
pub struct Service {
    forwarder: Forwarder,
    bridge: MqttBridge,
    reports: ReportConsumer,
    stats: Arc<Stats>,
    lifecycle: Arc<Lifecycle>,
    options: ServiceOptions,
}

impl Service {
    /// Construct every component. Nothing touches the network yet.
    pub fn new(config: Config, options: ServiceOptions) -> Result<Self> {
        let stats = Arc::new(Stats::new());

        let sender = HttpSender::new(&config.http).context("failed to build HTTP client")?;
        let mut forwarder = Forwarder::new(ForwarderConfig::from(&config.pipeline), Arc::new(sender));
        let reports = forwarder
            .take_reports()
            .context("forwarder report stream already taken")?;

        let bridge = MqttBridge::new(config.mqtt, forwarder.producer(), stats.clone());

        Ok(Self {
            forwarder,
            bridge,
            reports: ReportConsumer::new(reports, stats.clone()),
            stats,
            lifecycle: Lifecycle::new(),
            options,
        })
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        self.run_until(wait_for_signal()).await
    }

    /// Run until `shutdown` resolves.
    ///
    /// Returns an error if the bridge cannot start; that is fatal since there
    /// is no recovery path for an unreachable broker at startup.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let span = span!(Level::INFO, "m2http", version = env!("CARGO_PKG_VERSION"));
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            forwarder,
            mut bridge,
            reports,
            stats,
            lifecycle,
            options,
        } = self;

        let debug_server = match options.debug_address {
            Some(address) => match spawn_debug_server(address, stats, lifecycle.clone()).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "debug server unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        let engine = forwarder.run();
        let consumer = tokio::spawn(reports.run().in_current_span());

        let running = Running {
            engine,
            consumer,
            debug_server,
            lifecycle,
            drain_timeout: options.drain_timeout,
        };

        if let Err(e) = bridge.start().await {
            error!(error = %e, "failed to start MQTT bridge");
            running.shutdown(bridge).await;
            return Err(e).context("failed to start MQTT bridge");
        }

        running.lifecycle.mark_running();
        info!("m2http running");

        shutdown.await;
        info!("shutdown signal received, starting graceful shutdown");

        running.shutdown(bridge).await;

        info!("m2http stopped");
        Ok(())
    }
}

/// Tasks started by [`Service::run_until`].
struct Running {
    engine: JoinHandle<()>,
    consumer: JoinHandle<ReportSummary>,
    debug_server: Option<JoinHandle<()>>,
    lifecycle: Arc<Lifecycle>,
    drain_timeout: Duration,
}

impl Running {
    /// Stop the bridge, then give the forwarder a bounded window to drain.
    async fn shutdown(mut self, mut bridge: MqttBridge) {
        self.lifecycle.begin_shutdown();

        bridge.stop().await;
        // Dropping the bridge drops the last producer, closing the intake.
        drop(bridge);

        let drained = timeout(self.drain_timeout, async {
            let _ = (&mut self.engine).await;
            (&mut self.consumer).await
        })
        .await;

        match drained {
            Ok(Ok(summary)) => info!(
                delivered = summary.delivered,
                failed = summary.failed,
                "forwarder drained"
            ),
            Ok(Err(e)) => error!(error = %e, "report consumer failed"),
            Err(_) => {
                warn!(
                    drain_timeout_secs = self.drain_timeout.as_secs(),
                    "drain timeout reached, abandoning in-flight deliveries"
                );
                self.engine.abort();
                self.consumer.abort();
            }
        }

        if let Some(handle) = self.debug_server.take() {
            // The server watches the lifecycle and is already winding down.
            if timeout(Duration::from_secs(1), handle).await.is_err() {
                warn!("debug server did not stop in time");
            }
        }

        self.lifecycle.mark_stopped();
    }
}

async fn spawn_debug_server(
    address: SocketAddr,
    stats: Arc<Stats>,
    lifecycle: Arc<Lifecycle>,
) -> Result<JoinHandle<()>> {
    let server = AdminServer::bind(address, stats)
        .await
        .with_context(|| format!("failed to bind debug server on {address}"))?;

    Ok(tokio::spawn(
        async move {
            let stop = async move { lifecycle.wait_for(Phase::ShuttingDown).await };
            if let Err(e) = server.run(stop).await {
                error!(error = %e, "debug server failed");
            }
        }
        .in_current_span(),
    ))
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
    }
}
