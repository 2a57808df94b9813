//! Relaying one request to one executor.

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use axum::response::Response;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use runproxy_core::{HEADER_EXECUTOR_HOSTNAME, HEADER_RUNTIME_ID, error_chain};
use runproxy_state::{ExecutorStatus, RuntimeStatus};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, warn};

use crate::body::{FailureHook, RelayBody};
use crate::classify::{FailureKind, classify_body_error, classify_request_error};
use crate::context::AppContext;
use crate::error::ProxyError;

/// Never relayed in either direction.
const STRIPPED_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
];

/// An inbound request, detached from the client connection so it can be
/// sent to one or many executors.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub runtime_id: Option<String>,
}

impl Outbound {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        let runtime_id = headers
            .get(HEADER_RUNTIME_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| String::from("/"));
        Self {
            method,
            path_and_query,
            headers,
            body,
            runtime_id,
        }
    }
}

fn relayable(name: &HeaderName) -> bool {
    !STRIPPED_HEADERS.contains(&name.as_str())
}

/// Copy relayable headers; a repeated name keeps its last value.
pub fn relay_headers(source: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(source.keys_len());
    for (name, value) in source {
        if relayable(name) {
            relayed.insert(name.clone(), value.clone());
        }
    }
    relayed
}

fn upstream_request(
    ctx: &AppContext,
    hostname: &str,
    out: &Outbound,
) -> Result<Request<Full<Bytes>>, ProxyError> {
    let uri: Uri = format!("http://{hostname}{}", out.path_and_query)
        .parse()
        .map_err(|e| ProxyError::internal(format!("invalid executor URI for {hostname}: {e}")))?;

    let mut headers = relay_headers(&out.headers);
    let bearer = HeaderValue::try_from(format!("Bearer {}", ctx.config().executor_secret))
        .map_err(|e| ProxyError::internal(format!("invalid executor secret: {e}")))?;
    headers.insert(AUTHORIZATION, bearer);
    if ctx.config().mode.is_development() {
        let value = HeaderValue::try_from(hostname)
            .map_err(|e| ProxyError::internal(format!("invalid executor hostname: {e}")))?;
        headers.insert(HeaderName::from_static(HEADER_EXECUTOR_HOSTNAME), value);
    }

    let mut request = Request::new(Full::new(out.body.clone()));
    *request.method_mut() = out.method.clone();
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Forward `out` to `hostname` and relay the answer.
///
/// A runtime hint is recorded as warm before dispatch. Transport failures
/// degrade the stored state according to their [`FailureKind`].
pub async fn forward(
    ctx: &AppContext,
    hostname: &str,
    out: &Outbound,
) -> Result<Response, ProxyError> {
    let runtime_id = out.runtime_id.as_deref();
    if let Some(id) = runtime_id {
        ctx.state()
            .save_runtime(hostname, id, RuntimeStatus::Pass, 0.0)
            .await;
    }

    let request = upstream_request(ctx, hostname, out)?;
    let max_timeout = ctx.config().max_timeout;
    let deadline = Instant::now() + max_timeout;
    debug!(%hostname, method = %out.method, path = %out.path_and_query, "forwarding to executor");

    let response = match timeout_at(deadline, ctx.client().request(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let kind = classify_request_error(&e);
            let detail = error_chain(&e);
            degrade(ctx, hostname, runtime_id, kind, &detail).await;
            return Err(ProxyError::upstream(hostname, kind, detail));
        }
        Err(_) => {
            let detail = format!("operation timed out after {max_timeout:?}");
            degrade(ctx, hostname, runtime_id, FailureKind::Timeout, &detail).await;
            return Err(ProxyError::upstream(hostname, FailureKind::Timeout, detail));
        }
    };

    let (parts, incoming) = response.into_parts();
    let body = if ctx.config().buffer_responses {
        match timeout_at(deadline, incoming.collect()).await {
            Ok(Ok(collected)) => Body::from(collected.to_bytes()),
            Ok(Err(e)) => {
                let kind = classify_body_error(&e);
                let detail = error_chain(&e);
                degrade(ctx, hostname, runtime_id, kind, &detail).await;
                return Err(ProxyError::upstream(hostname, kind, detail));
            }
            Err(_) => {
                let detail = format!("operation timed out after {max_timeout:?}");
                degrade(ctx, hostname, runtime_id, FailureKind::Timeout, &detail).await;
                return Err(ProxyError::upstream(hostname, FailureKind::Timeout, detail));
            }
        }
    } else {
        let hook = FailureHook::new(ctx.clone(), hostname, out.runtime_id.clone());
        Body::new(RelayBody::new(incoming, deadline, hook))
    };

    let mut response = Response::new(body);
    *response.status_mut() = parts.status;
    *response.headers_mut() = relay_headers(&parts.headers);
    Ok(response)
}

/// Write back what a transport failure says about the executor.
pub(crate) async fn degrade(
    ctx: &AppContext,
    hostname: &str,
    runtime_id: Option<&str>,
    kind: FailureKind,
    detail: &str,
) {
    let state = ctx.state();
    if kind.executor_down() {
        state
            .save_executor(hostname, ExecutorStatus::Offline, 100.0)
            .await;
        state.clear_runtimes(hostname).await;
        error!(%hostname, %kind, "Executor '{hostname}' appears to be down ({detail}). Removed from state.");
    } else if kind.runtime_failed() {
        if let Some(id) = runtime_id {
            state
                .save_runtime(hostname, id, RuntimeStatus::Fail, 0.0)
                .await;
            warn!(%hostname, runtime_id = %id, %kind, "Runtime '{id}' on executor '{hostname}' encountered an error ({detail}).");
        }
    }
}
