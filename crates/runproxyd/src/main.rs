//! runproxyd: the runproxy daemon.
//!
//! Wires the state store, health checker and HTTP surface together.
//!
//! # Usage
//!
//! ```text
//! runproxyd --port 80 --executors exec1:80,exec2:80 --secret proxy-key
//! runproxyd check --executors exec1:80
//! runproxyd flush-state --state redis://redis:6379
//! ```
//!
//! Every flag also reads an `OPR_PROXY_*` environment variable.

mod settings;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use runproxy_core::{ExecutorClient, LoggingProvider, Reporter, TracingReporter, build_client};
use runproxy_health::{HealthChecker, Ping};
use runproxy_server::config::DEFAULT_CONNECT_TIMEOUT;
use runproxy_server::{AppContext, build_router};
use runproxy_state::StateStore;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use settings::{Cli, Command, LogFormat, Settings};

const DEFAULT_LOG_FILTER: &str = "info,runproxyd=debug,runproxy=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.settings.log_format);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.settings).await,
        Command::Check => check(cli.settings).await,
        Command::FlushState => flush_state(cli.settings).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn connect_state(settings: &Settings) -> anyhow::Result<StateStore> {
    let state = StateStore::connect(&settings.state, settings.state_cache_ttl())
        .await
        .with_context(|| format!("connecting to state store {:?}", settings.state))?;
    info!(
        backend = state.backend_name(),
        cache_ttl_s = settings.state_cache_ttl,
        "state store connected"
    );
    Ok(state)
}

fn reporter(settings: &Settings) -> anyhow::Result<Option<Arc<dyn Reporter>>> {
    let provider = LoggingProvider::parse(&settings.logging_provider, &settings.logging_config)
        .context("logging provider configuration")?;
    Ok(provider.map(|provider| {
        info!(provider = %provider.name, "error reporting enabled");
        Arc::new(TracingReporter::new(provider)) as Arc<dyn Reporter>
    }))
}

fn health_checker(
    settings: &Settings,
    state: StateStore,
    client: ExecutorClient,
    reporter: Option<Arc<dyn Reporter>>,
) -> anyhow::Result<HealthChecker> {
    let ping = settings
        .ping_url()
        .map(|url| Ping::new(&url, DEFAULT_CONNECT_TIMEOUT))
        .transpose()
        .context("--health-check-url")?;

    Ok(HealthChecker::new(settings.hostnames(), state, client)
        .with_executor_secret(settings.executor_secret.clone())
        .with_reporter(reporter)
        .with_mode(settings.mode, settings.version_tag.clone())
        .with_ping(ping))
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let config = settings.proxy_config();
    info!(
        version = %config.version,
        mode = %config.mode,
        executors = config.executors.len(),
        algorithm = settings.algorithm().name(),
        addressing_method = %config.addressing_method,
        "runproxy starting"
    );
    if config.secret.is_empty() {
        warn!("no proxy secret configured, every request will be rejected");
    }
    if config.executors.is_empty() {
        warn!("no executors configured");
    }

    let state = connect_state(&settings).await?;
    let reporter = reporter(&settings)?;
    let client = build_client(config.connect_timeout);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The first sweep completes before traffic is accepted.
    let health_handle = if settings.health_check {
        let checker = health_checker(&settings, state.clone(), client.clone(), reporter.clone())?;
        let report = checker.check(true).await;
        info!(
            online = report.online(),
            total = report.nodes.len(),
            "initial health check finished"
        );
        let interval = settings.health_check_interval();
        Some(tokio::spawn(checker.run(interval, shutdown_rx)))
    } else {
        warn!("health checks disabled, executor state is only updated by traffic");
        None
    };

    let ctx = AppContext::with_client(config, state, settings.algorithm(), reporter, client);
    let router = build_router(ctx);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "proxy listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(handle) = health_handle {
        let _ = handle.await;
    }
    info!("runproxy stopped");
    Ok(())
}

async fn check(settings: Settings) -> anyhow::Result<()> {
    let state = connect_state(&settings).await?;
    let reporter = reporter(&settings)?;
    let client = build_client(settings.proxy_config().connect_timeout);

    let report = health_checker(&settings, state, client, reporter)?
        .check(true)
        .await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.healthy {
        anyhow::bail!(
            "{} of {} executors offline",
            report.nodes.len() - report.online(),
            report.nodes.len()
        );
    }
    Ok(())
}

async fn flush_state(settings: Settings) -> anyhow::Result<()> {
    let state = connect_state(&settings).await?;
    if !state.flush().await {
        anyhow::bail!("flushing {} state failed", state.backend_name());
    }
    info!(backend = state.backend_name(), "state flushed");
    Ok(())
}
