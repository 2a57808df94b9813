//! Health checking for the executor fleet.
//!
//! # Architecture
//!
//! ```text
//! HealthChecker::check(force_log)
//!   ├── read previous executor statuses from the StateStore
//!   ├── probe every executor concurrently (GET /v1/health) → Node
//!   ├── per node: log transitions, save {status, usage}, replace runtimes
//!   └── all online → best-effort GET of the external ping URL (http or https)
//! ```
//!
//! A sweep never fails as a whole: a probe that errors or panics turns its
//! node offline and the sweep carries on. [`HealthChecker::run`] repeats
//! sweeps on a fixed interval until shut down; sweeps never overlap.

pub mod checker;
pub mod node;
pub mod ping;
pub mod probe;

pub use checker::{HealthChecker, NodeOutcome, SweepReport, Transition};
pub use node::Node;
pub use ping::{Ping, PingError};
pub use probe::{ProbeError, probe};

/// Path probed on every executor.
pub const HEALTH_PATH: &str = "/v1/health";
