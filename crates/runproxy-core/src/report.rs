//! Error-report sink.
//!
//! Upstream transport failures and executors going offline are pushed to
//! an error-tracking provider when one is configured. The provider is
//! chosen from a name plus a DSN-style config string; reports are emitted
//! as structured events on the `runproxy::report` target, where the log
//! shipper of the deployment picks them up for the provider.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::error;

use crate::dsn::Dsn;
use crate::error::ConfigError;
use crate::mode::Mode;

/// Providers the proxy knows how to address.
const SUPPORTED_PROVIDERS: &[&str] = &["sentry", "logowl", "raygun", "appsignal"];

/// Provider-specific credentials extracted from the logging config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Sentry {
        key: String,
        project_id: String,
        host: String,
    },
    LogOwl {
        ticket: String,
        host: String,
    },
    Key {
        key: String,
    },
}

impl ProviderConfig {
    /// Where reports for this provider go, with credentials left out.
    ///
    /// Sentry yields `<host>/<project_id>`, LogOwl its host; key-only
    /// providers have no routing beyond the provider name.
    pub fn destination(&self) -> String {
        match self {
            ProviderConfig::Sentry { project_id, host, .. } => match (host.is_empty(), project_id.is_empty()) {
                (_, true) => host.clone(),
                (true, false) => project_id.clone(),
                (false, false) => format!("{host}/{project_id}"),
            },
            ProviderConfig::LogOwl { host, .. } => host.clone(),
            ProviderConfig::Key { .. } => String::new(),
        }
    }
}

/// A configured error-tracking provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingProvider {
    pub name: String,
    pub config: ProviderConfig,
}

impl LoggingProvider {
    /// Resolve the provider from its name and config string.
    ///
    /// The config is read as a DSN first (its scheme then names the
    /// provider); otherwise it is split on `;`. Returns `Ok(None)` when no
    /// provider is configured.
    pub fn parse(provider: &str, config: &str) -> Result<Option<Self>, ConfigError> {
        let (name, config) = match Dsn::parse(config) {
            Ok(dsn) => {
                let name = dsn.scheme.clone();
                let config = match name.as_str() {
                    "sentry" => ProviderConfig::Sentry {
                        key: dsn.password.unwrap_or_default(),
                        project_id: dsn.user.unwrap_or_default(),
                        host: format!("https://{}", dsn.host),
                    },
                    "logowl" => ProviderConfig::LogOwl {
                        ticket: dsn.user.unwrap_or_default(),
                        host: dsn.host,
                    },
                    _ => ProviderConfig::Key { key: dsn.host },
                };
                (name, config)
            }
            Err(_) => {
                let name = provider.trim().to_ascii_lowercase();
                let mut chunks = config.split(';');
                let config = match name.as_str() {
                    "sentry" => ProviderConfig::Sentry {
                        key: chunks.next().unwrap_or_default().to_string(),
                        project_id: chunks.next().unwrap_or_default().to_string(),
                        host: String::new(),
                    },
                    "logowl" => ProviderConfig::LogOwl {
                        ticket: chunks.next().unwrap_or_default().to_string(),
                        host: String::new(),
                    },
                    _ => ProviderConfig::Key {
                        key: config.to_string(),
                    },
                };
                (name, config)
            }
        };

        if name.is_empty() {
            return Ok(None);
        }
        if !SUPPORTED_PROVIDERS.contains(&name.as_str()) {
            return Err(ConfigError::UnsupportedProvider(name));
        }
        Ok(Some(Self { name, config }))
    }
}

/// One error pushed to the error-tracking provider.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub namespace: &'static str,
    pub server: String,
    pub version: String,
    pub environment: &'static str,
    pub action: String,
    pub message: String,
    pub code: u16,
    pub error_type: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub trace: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl ErrorReport {
    pub fn new(action: &str, message: impl Into<String>, version: &str, mode: Mode) -> Self {
        Self {
            namespace: "proxy",
            server: server_name(),
            version: version.to_string(),
            environment: mode.environment(),
            action: action.to_string(),
            message: message.into(),
            code: 500,
            error_type: "Error".to_string(),
            file: None,
            line: None,
            trace: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self.tags.insert("code".to_string(), code.to_string());
        self
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self.tags
            .insert("verboseType".to_string(), self.error_type.clone());
        self
    }

    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.file = Some(file.to_string());
        self.line = Some(line);
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }
}

/// Destination for error reports.
pub trait Reporter: Send + Sync {
    fn provider(&self) -> &str;

    fn report(&self, report: &ErrorReport);
}

/// Emits each report as a single structured `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    provider: LoggingProvider,
    destination: String,
}

impl TracingReporter {
    pub fn new(provider: LoggingProvider) -> Self {
        let destination = provider.config.destination();
        Self {
            provider,
            destination,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl Reporter for TracingReporter {
    fn provider(&self) -> &str {
        &self.provider.name
    }

    fn report(&self, report: &ErrorReport) {
        let tags = serde_json::to_string(&report.tags).unwrap_or_default();
        error!(
            target: "runproxy::report",
            provider = %self.provider.name,
            destination = %self.destination,
            namespace = report.namespace,
            server = %report.server,
            version = %report.version,
            environment = report.environment,
            action = %report.action,
            code = report.code,
            error_type = %report.error_type,
            file = report.file.as_deref().unwrap_or(""),
            line = report.line.unwrap_or(0),
            trace = report.trace.as_deref().unwrap_or(""),
            %tags,
            "{}",
            report.message
        );
    }
}

fn server_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
