//! One `/v1/health` probe against one executor.

use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use runproxy_core::{ExecutorClient, error_chain};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::HEALTH_PATH;
use crate::node::Node;

/// Message stored for a 200 response whose body is not a passing report.
pub const NOT_PASSING: &str = "Response does not include \"pass\" status.";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe request: {0}")]
    Request(String),

    #[error("{}", error_chain(.0))]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Probe `hostname` and turn whatever happened into a [`Node`].
///
/// Never fails: transport errors and timeouts produce an offline node.
pub async fn probe(
    client: &ExecutorClient,
    hostname: &str,
    secret: &str,
    timeout: Duration,
) -> Node {
    let outcome = match tokio::time::timeout(timeout, fetch(client, hostname, secret)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };

    match outcome {
        Ok((status, body)) => classify(hostname, status, &body),
        Err(e) => {
            debug!(%hostname, error = %e, "health probe failed");
            Node::offline(hostname, diagnostic(0, b"", &e.to_string()))
        }
    }
}

async fn fetch(
    client: &ExecutorClient,
    hostname: &str,
    secret: &str,
) -> Result<(StatusCode, Bytes), ProbeError> {
    let req = Request::get(format!("http://{hostname}{HEALTH_PATH}"))
        .header(AUTHORIZATION, format!("Bearer {secret}"))
        .header(USER_AGENT, concat!("runproxy-health/", env!("CARGO_PKG_VERSION")))
        .body(Full::new(Bytes::new()))
        .map_err(|e| ProbeError::Request(e.to_string()))?;

    let resp = client.request(req).await?;
    let status = resp.status();
    let body = resp.into_body().collect().await?.to_bytes();
    Ok((status, body))
}

/// Online only for a 200 whose JSON body has `"status": "pass"`.
pub fn classify(hostname: &str, status: StatusCode, body: &[u8]) -> Node {
    if status != StatusCode::OK {
        return Node::offline(hostname, diagnostic(status.as_u16(), body, ""));
    }

    match serde_json::from_slice::<Map<String, Value>>(body) {
        Ok(state) if state.get("status").and_then(Value::as_str) == Some("pass") => {
            Node::online(hostname, state)
        }
        _ => Node::offline(hostname, NOT_PASSING),
    }
}

fn diagnostic(code: u16, body: &[u8], error: &str) -> String {
    format!(
        "Code: {code} with response \"{}\" and error: {error}",
        String::from_utf8_lossy(body)
    )
}
