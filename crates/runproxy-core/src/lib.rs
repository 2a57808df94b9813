//! Shared vocabulary for the runproxy crates.
//!
//! Holds the pieces every other crate needs without depending on each
//! other: the operating [`Mode`], the `x-opr-*` header names, the HTTP
//! client used to talk to executors, and the error-report sink that
//! offline transitions and upstream failures are pushed into.

pub mod client;
pub mod dsn;
pub mod error;
pub mod mode;
pub mod report;

pub use client::{ExecutorClient, WebClient, build_client, build_web_client};
pub use dsn::Dsn;
pub use error::{ConfigError, error_chain};
pub use mode::Mode;
pub use report::{ErrorReport, LoggingProvider, Reporter, TracingReporter};

/// Affinity hint: the runtime the request should land on.
pub const HEADER_RUNTIME_ID: &str = "x-opr-runtime-id";

/// Addressing method override for a single request.
pub const HEADER_ADDRESSING_METHOD: &str = "x-opr-addressing-method";

/// Added to forwarded requests in development mode so tests can tell
/// which executor served them.
pub const HEADER_EXECUTOR_HOSTNAME: &str = "x-opr-executor-hostname";
