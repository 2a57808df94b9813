//! Settings the proxy needs at request time.

use std::time::Duration;

use runproxy_balancer::AddressingMethod;
use runproxy_core::Mode;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(900);
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 22 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Bearer token clients must present.
    pub secret: String,
    /// Bearer token injected into every executor call.
    pub executor_secret: String,
    /// Configured executor hostnames (`host[:port]`), in pool order.
    pub executors: Vec<String>,
    /// Used when a request carries no addressing-method header.
    pub addressing_method: AddressingMethod,
    pub connect_timeout: Duration,
    /// Ceiling on a whole forwarded exchange, body included.
    pub max_timeout: Duration,
    pub mode: Mode,
    pub version: String,
    /// Collect executor responses before relaying instead of streaming.
    pub buffer_responses: bool,
    pub max_payload_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            executor_secret: String::new(),
            executors: Vec::new(),
            addressing_method: AddressingMethod::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_timeout: DEFAULT_MAX_TIMEOUT,
            mode: Mode::default(),
            version: String::from("UNKNOWN"),
            buffer_responses: false,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}
