//! HTTP surface of the proxy.
//!
//! # Routes
//!
//! | Method | Path | Auth | Description |
//! |---|---|---|---|
//! | GET | `/v1/proxy/health` | no | Liveness, always `200 OK` |
//! | GET | `/v1/proxy/stats` | yes | Executors with their runtimes |
//! | GET | `/v1/debug/redis-perf` | yes | State query timings |
//! | * | everything else | yes | Forwarded to a selected executor |
//!
//! Forwarded requests honour two headers: `x-opr-runtime-id` (affinity
//! hint) and `x-opr-addressing-method` (`anycast-efficient`,
//! `anycast-fast` or `broadcast`).

pub mod auth;
pub mod body;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod forward;
pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;

pub use classify::FailureKind;
pub use config::ProxyConfig;
pub use context::AppContext;
pub use error::{ErrorKind, ProxyError};

/// Build the complete proxy router.
pub fn build_router(ctx: AppContext) -> Router {
    let payload_limit = ctx.config().max_payload_size;

    Router::new()
        .route("/v1/proxy/health", get(handlers::health))
        .route("/v1/proxy/stats", get(handlers::stats))
        .route("/v1/debug/redis-perf", get(handlers::redis_perf))
        .fallback(handlers::proxy)
        .layer(DefaultBodyLimit::max(payload_limit))
        .with_state(ctx)
}
