//! Route handlers.

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::BodyExt;
use runproxy_balancer::{AddressingMethod, build_pipeline, order_options};
use runproxy_core::HEADER_ADDRESSING_METHOD;
use runproxy_state::{ExecutorRecord, RESOURCE_EXECUTORS, runtimes_resource};
use serde::Serialize;
use tracing::debug;

use crate::auth::Authorized;
use crate::context::AppContext;
use crate::error::ProxyError;
use crate::forward::{Outbound, forward};

// ── Proxy ──────────────────────────────────────────────────────

/// `* /*`: everything not matched by a fixed route.
pub async fn proxy(
    _: Authorized,
    State(ctx): State<AppContext>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let out = Outbound::new(method, &uri, headers, body);
    match dispatch(&ctx, &out, &uri).await {
        Ok(response) => response,
        Err(err) => ctx.fail(err, &out.method, &uri),
    }
}

async fn dispatch(ctx: &AppContext, out: &Outbound, uri: &Uri) -> Result<Response, ProxyError> {
    let header = out
        .headers
        .get(HEADER_ADDRESSING_METHOD)
        .map(|value| String::from_utf8_lossy(value.as_bytes()));
    let method = AddressingMethod::from_header(header.as_deref(), ctx.config().addressing_method);

    let options = order_options(&ctx.config().executors, ctx.state().snapshot().await);
    let pipeline = build_pipeline(method, out.runtime_id.as_deref(), options, ctx.algorithm());
    if ctx.config().mode.is_development() {
        debug!(
            %method,
            options = %serde_json::to_string(pipeline.options()).unwrap_or_default(),
            "balancing options"
        );
    }

    if method == AddressingMethod::Broadcast {
        let targets = pipeline.broadcast_targets();
        if targets.is_empty() {
            return Err(ProxyError::no_target());
        }
        for target in targets {
            spawn_broadcast(ctx.clone(), target.hostname.clone(), out.clone(), uri.clone());
        }
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let selection = pipeline.select().ok_or_else(|| ProxyError::no_target())?;
    debug!(
        hostname = selection.hostname(),
        tier = selection.tier,
        algorithm = ctx.algorithm().name(),
        "executor selected"
    );
    forward(ctx, selection.hostname(), out).await
}

/// Fire-and-forget forward; the response body is drained and dropped.
fn spawn_broadcast(ctx: AppContext, hostname: String, out: Outbound, uri: Uri) {
    tokio::spawn(async move {
        match forward(&ctx, &hostname, &out).await {
            Ok(response) => {
                let status = response.status();
                let drained = response.into_body().collect().await.is_ok();
                debug!(%hostname, %status, drained, "broadcast delivered");
            }
            Err(err) => ctx.log_error(&err, &out.method, &uri),
        }
    });
}

// ── Fixed endpoints ────────────────────────────────────────────

/// GET /v1/proxy/health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /v1/proxy/stats
pub async fn stats(
    _: Authorized,
    State(ctx): State<AppContext>,
) -> Json<BTreeMap<String, ExecutorRecord>> {
    let snapshot = ctx.state().snapshot().await;
    Json(
        snapshot
            .into_iter()
            .map(|executor| (executor.hostname.clone(), executor))
            .collect(),
    )
}

#[derive(Debug, Serialize)]
pub struct PerfReport {
    pub success: bool,
    pub stats: PerfStats,
    pub timestamp_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PerfStats {
    pub executor_query_time_ms: f64,
    pub runtime_query_time_ms: f64,
    pub processing_time_ms: f64,
    pub runtime_sizes: BTreeMap<String, usize>,
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// GET /v1/debug/redis-perf
pub async fn redis_perf(_: Authorized, State(ctx): State<AppContext>) -> Json<PerfReport> {
    let state = ctx.state();

    let started = Instant::now();
    let executors = state.list(RESOURCE_EXECUTORS).await;
    let executor_query_time_ms = millis(started.elapsed());

    let started = Instant::now();
    let mut runtimes = Vec::with_capacity(executors.len());
    for hostname in executors.keys() {
        let entries = state.list(&runtimes_resource(hostname)).await;
        runtimes.push((hostname.clone(), entries));
    }
    let runtime_query_time_ms = millis(started.elapsed());

    let started = Instant::now();
    let runtime_sizes = runtimes
        .into_iter()
        .map(|(hostname, entries)| (hostname, entries.len()))
        .collect();
    let processing_time_ms = millis(started.elapsed());

    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    Json(PerfReport {
        success: true,
        stats: PerfStats {
            executor_query_time_ms,
            runtime_query_time_ms,
            processing_time_ms,
            runtime_sizes,
        },
        timestamp_ms,
    })
}

