//! Application context shared by every handler.

use std::sync::Arc;

use axum::http::{Method, Uri};
use axum::response::Response;
use runproxy_balancer::Algorithm;
use runproxy_core::{ExecutorClient, Reporter, build_client};
use runproxy_state::StateStore;
use tracing::{debug, error, warn};

use crate::config::ProxyConfig;
use crate::error::{ErrorKind, ProxyError};

/// Built once at startup and cloned into each request.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<Inner>,
}

struct Inner {
    config: ProxyConfig,
    state: StateStore,
    algorithm: Algorithm,
    client: ExecutorClient,
    reporter: Option<Arc<dyn Reporter>>,
}

impl AppContext {
    pub fn new(
        config: ProxyConfig,
        state: StateStore,
        algorithm: Algorithm,
        reporter: Option<Arc<dyn Reporter>>,
    ) -> Self {
        let client = build_client(config.connect_timeout);
        Self::with_client(config, state, algorithm, reporter, client)
    }

    pub fn with_client(
        config: ProxyConfig,
        state: StateStore,
        algorithm: Algorithm,
        reporter: Option<Arc<dyn Reporter>>,
        client: ExecutorClient,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                algorithm,
                client,
                reporter,
            }),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.inner.algorithm
    }

    pub fn client(&self) -> &ExecutorClient {
        &self.inner.client
    }

    pub fn reporter(&self) -> Option<&Arc<dyn Reporter>> {
        self.inner.reporter.as_ref()
    }

    /// Log an error by class and push upstream failures to the reporter.
    pub fn log_error(&self, err: &ProxyError, method: &Method, uri: &Uri) {
        match err.kind() {
            ErrorKind::Unauthorized => {
                debug!(%method, %uri, "rejected request without a valid proxy key");
            }
            ErrorKind::NoTarget => {
                warn!(%method, %uri, code = err.code(), "{err}");
            }
            ErrorKind::Upstream { .. } | ErrorKind::Internal(_) => {
                error!(
                    %method,
                    %uri,
                    error_type = err.type_name(),
                    file = err.file(),
                    line = err.line(),
                    "{err}"
                );
                if let Some(reporter) = self.reporter() {
                    let config = self.config();
                    let report = err
                        .report("httpError", &config.version, config.mode)
                        .with_tag("method", method.as_str())
                        .with_tag("url", uri.path());
                    reporter.report(&report);
                }
            }
        }
    }

    /// Log `err` and render it as the JSON error response.
    pub fn fail(&self, err: ProxyError, method: &Method, uri: &Uri) -> Response {
        self.log_error(&err, method, uri);
        let config = self.config();
        err.render(config.mode, &config.version)
    }
}
