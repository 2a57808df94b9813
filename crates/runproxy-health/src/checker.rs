//! Sweeps over the whole executor fleet.

use std::sync::Arc;
use std::time::Duration;

use runproxy_core::{ErrorReport, ExecutorClient, Mode, Reporter};
use runproxy_state::{ExecutorStatus, StateStore};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::node::Node;
use crate::ping::Ping;
use crate::probe::probe;

/// Probe timeout when none is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Usage recorded for an executor that failed its probe.
const OFFLINE_USAGE: f64 = 100.0;

/// What one sweep found for one executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutcome {
    pub hostname: String,
    pub status: ExecutorStatus,
    pub usage: f64,
    pub runtimes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A status change that was logged during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub hostname: String,
    pub from: Option<ExecutorStatus>,
    pub to: ExecutorStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// In configuration order.
    pub nodes: Vec<NodeOutcome>,
    pub transitions: Vec<Transition>,
    pub healthy: bool,
}

impl SweepReport {
    pub fn node(&self, hostname: &str) -> Option<&NodeOutcome> {
        self.nodes.iter().find(|n| n.hostname == hostname)
    }

    pub fn online(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.status == ExecutorStatus::Online)
            .count()
    }
}

/// Probes every configured executor and records the results.
#[derive(Clone)]
pub struct HealthChecker {
    hostnames: Vec<String>,
    executor_secret: String,
    client: ExecutorClient,
    state: StateStore,
    reporter: Option<Arc<dyn Reporter>>,
    mode: Mode,
    version: String,
    ping: Option<Ping>,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(hostnames: Vec<String>, state: StateStore, client: ExecutorClient) -> Self {
        Self {
            hostnames,
            executor_secret: String::new(),
            client,
            state,
            reporter: None,
            mode: Mode::default(),
            version: String::from("UNKNOWN"),
            ping: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_executor_secret(mut self, secret: impl Into<String>) -> Self {
        self.executor_secret = secret.into();
        self
    }

    pub fn with_reporter(mut self, reporter: Option<Arc<dyn Reporter>>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_mode(mut self, mode: Mode, version: impl Into<String>) -> Self {
        self.mode = mode;
        self.version = version.into();
        self
    }

    /// External URL pinged after a sweep that found every executor online.
    pub fn with_ping(mut self, ping: Option<Ping>) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    /// Run one sweep.
    ///
    /// Transitions are logged when `force_log` is set, in development mode,
    /// or when the stored status differs from the probed one.
    pub async fn check(&self, force_log: bool) -> SweepReport {
        let previous = self.state.list_executors().await;
        let nodes = self.probe_all().await;

        let mut report = SweepReport {
            healthy: true,
            ..SweepReport::default()
        };

        for node in nodes {
            let hostname = node.hostname().to_string();
            let status = if node.is_online() {
                ExecutorStatus::Online
            } else {
                ExecutorStatus::Offline
            };
            let from = previous.get(&hostname).map(|e| e.status);

            if force_log || self.mode.is_development() || from != Some(status) {
                self.log_transition(&node);
                report.transitions.push(Transition {
                    hostname: hostname.clone(),
                    from,
                    to: status,
                });
            }

            let usage = if node.is_online() {
                node.usage()
            } else {
                OFFLINE_USAGE
            };
            let runtimes = node.runtimes();

            self.state.save_executor(&hostname, status, usage).await;
            self.state.replace_runtimes(&hostname, &runtimes).await;

            report.healthy &= node.is_online();
            report.nodes.push(NodeOutcome {
                hostname,
                status,
                usage,
                runtimes: runtimes.len(),
                message: node.message().map(str::to_string),
            });
        }

        debug!(
            executors = report.nodes.len(),
            online = report.online(),
            "health sweep finished"
        );

        if report.healthy {
            if let Some(ping) = &self.ping {
                self.ping(ping).await;
            }
        }

        report
    }

    /// Probe every executor concurrently; results come back in
    /// configuration order once all probes have resolved.
    async fn probe_all(&self) -> Vec<Node> {
        let mut set = JoinSet::new();
        for (idx, hostname) in self.hostnames.iter().enumerate() {
            let client = self.client.clone();
            let hostname = hostname.clone();
            let secret = self.executor_secret.clone();
            let timeout = self.probe_timeout;
            set.spawn(async move { (idx, probe(&client, &hostname, &secret, timeout).await) });
        }

        let mut slots: Vec<Option<Node>> = vec![None; self.hostnames.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, node)) => slots[idx] = Some(node),
                Err(e) => warn!(error = %e, "health probe task failed"),
            }
        }

        slots
            .into_iter()
            .zip(&self.hostnames)
            .map(|(slot, hostname)| {
                slot.unwrap_or_else(|| Node::offline(hostname.as_str(), "Unexpected error."))
            })
            .collect()
    }

    fn log_transition(&self, node: &Node) {
        let hostname = node.hostname();
        if node.is_online() {
            info!(%hostname, usage = node.usage(), "Executor \"{hostname}\" went online");
            return;
        }

        let message = format!(
            "Executor \"{hostname}\" went offline: {}",
            node.message().unwrap_or("Unexpected error.")
        );
        error!(%hostname, "{message}");

        if let Some(reporter) = &self.reporter {
            let report = ErrorReport::new("healthCheckError", message, &self.version, self.mode)
                .with_code(500)
                .with_error_type("ExecutorOffline")
                .with_location(file!(), line!())
                .with_tag("hostname", hostname);
            reporter.report(&report);
        }
    }

    async fn ping(&self, ping: &Ping) {
        let url = ping.url();
        let failure = match ping.send(self.probe_timeout).await {
            Ok(status) => {
                debug!(%url, %status, "health check URL pinged");
                return;
            }
            Err(failure) => failure,
        };

        error!(%url, error = %failure, "health check URL ping failed");
        if let Some(reporter) = &self.reporter {
            let report = ErrorReport::new("healthCheckError", failure, &self.version, self.mode)
                .with_location(file!(), line!())
                .with_tag("url", url.to_string());
            reporter.report(&report);
        }
    }

    /// Sweep every `interval` until `shutdown` flips to true.
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            executors = self.hostnames.len(),
            interval_ms = interval.as_millis() as u64,
            "health check loop starting"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.check(false).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("health check loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

