//! Command line and environment configuration.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use runproxy_balancer::{AddressingMethod, Algorithm};
use runproxy_core::Mode;
use runproxy_server::ProxyConfig;
use runproxy_server::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PAYLOAD_SIZE};

#[derive(Parser)]
#[command(name = "runproxyd", about = "Load-balancing proxy for runtime executors")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve proxied traffic (the default).
    Serve,
    /// Run one health sweep and print what it found as JSON.
    Check,
    /// Wipe every record from the configured state store.
    FlushState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 80, global = true)]
    pub port: u16,

    /// Key clients must present as `Authorization: Bearer <key>`.
    #[arg(long, env = "OPR_PROXY_SECRET", default_value = "", hide_env_values = true, global = true)]
    pub secret: String,

    /// Key sent to executors.
    #[arg(long, env = "OPR_PROXY_EXECUTOR_SECRET", default_value = "", hide_env_values = true, global = true)]
    pub executor_secret: String,

    /// Comma separated executor hostnames (`host[:port]`).
    #[arg(long, env = "OPR_PROXY_EXECUTORS", value_delimiter = ',', global = true)]
    pub executors: Vec<String>,

    /// random, round-robin, first or last.
    #[arg(long, env = "OPR_PROXY_ALGORITHM", default_value = "random", global = true)]
    pub algorithm: String,

    #[arg(long, env = "OPR_PROXY_ADDRESSING_METHOD", default_value = "anycast-efficient", global = true)]
    pub addressing_method: AddressingMethod,

    #[arg(long, env = "OPR_PROXY_HEALTHCHECK", default_value_t = true, action = clap::ArgAction::Set, global = true)]
    pub health_check: bool,

    /// Milliseconds between health sweeps.
    #[arg(long, env = "OPR_PROXY_HEALTHCHECK_INTERVAL", default_value_t = 10_000, global = true)]
    pub health_check_interval: u64,

    /// Pinged after every sweep that finds all executors online.
    #[arg(long, env = "OPR_PROXY_HEALTHCHECK_URL", global = true)]
    pub health_check_url: Option<String>,

    /// Seconds a forwarded exchange may take, body included.
    #[arg(long, env = "OPR_PROXY_MAX_TIMEOUT", default_value_t = 900, global = true)]
    pub max_timeout: u64,

    /// memory://, redb:///path, redis://host:port or redis-cluster://[h1:p1;h2:p2].
    #[arg(long, env = "OPR_PROXY_CONNECTIONS_STATE", default_value = "memory://", global = true)]
    pub state: String,

    /// Seconds the in-process state cache holds a snapshot; 0 disables it.
    #[arg(long, env = "OPR_PROXY_STATE_CACHE_TTL", default_value_t = 0, global = true)]
    pub state_cache_ttl: u64,

    #[arg(long, env = "OPR_PROXY_LOGGING_PROVIDER", default_value = "", global = true)]
    pub logging_provider: String,

    #[arg(long, env = "OPR_PROXY_LOGGING_CONFIG", default_value = "", hide_env_values = true, global = true)]
    pub logging_config: String,

    /// production or development.
    #[arg(long = "env", env = "OPR_PROXY_ENV", default_value = "production", global = true)]
    pub mode: Mode,

    #[arg(long, env = "OPR_PROXY_VERSION", default_value = "UNKNOWN", global = true)]
    pub version_tag: String,

    /// Collect executor responses before relaying them.
    #[arg(long, env = "OPR_PROXY_BUFFER_RESPONSES", default_value_t = false, action = clap::ArgAction::Set, global = true)]
    pub buffer_responses: bool,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "OPR_PROXY_MAX_PAYLOAD_SIZE", default_value_t = DEFAULT_MAX_PAYLOAD_SIZE, global = true)]
    pub max_payload_size: usize,

    #[arg(long, env = "OPR_PROXY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

impl Settings {
    /// Configured executors, trimmed, blanks and repeats dropped.
    pub fn hostnames(&self) -> Vec<String> {
        let mut hostnames: Vec<String> = Vec::with_capacity(self.executors.len());
        for host in self.executors.iter().map(|h| h.trim()) {
            if !host.is_empty() && !hostnames.iter().any(|h| h == host) {
                hostnames.push(host.to_string());
            }
        }
        hostnames
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from_name(&self.algorithm)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval)
    }

    pub fn state_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.state_cache_ttl)
    }

    pub fn ping_url(&self) -> Option<String> {
        self.health_check_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            secret: self.secret.clone(),
            executor_secret: self.executor_secret.clone(),
            executors: self.hostnames(),
            addressing_method: self.addressing_method,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_timeout: Duration::from_secs(self.max_timeout),
            mode: self.mode,
            version: self.version_tag.clone(),
            buffer_responses: self.buffer_responses,
            max_payload_size: self.max_payload_size,
        }
    }
}
