//! External uptime ping, sent after a sweep that found every executor
//! online.

use std::time::Duration;

use bytes::Bytes;
use http::{Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use runproxy_core::{ConfigError, WebClient, build_web_client, error_chain};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PingError {
    #[error("invalid health check URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Client(#[from] ConfigError),
}

/// A validated `http://` or `https://` URL and the client that reaches it.
#[derive(Clone)]
pub struct Ping {
    url: Uri,
    client: WebClient,
}

impl Ping {
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, PingError> {
        let invalid = |reason: String| PingError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let uri: Uri = url.trim().parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
        match uri.scheme_str() {
            Some("http" | "https") => {}
            Some(other) => return Err(invalid(format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme".to_string())),
        }
        if uri.host().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self {
            url: uri,
            client: build_web_client(connect_timeout)?,
        })
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// GET the URL within `timeout`; the failure is rendered for logging.
    pub async fn send(&self, timeout: Duration) -> Result<StatusCode, String> {
        let req = Request::get(self.url.clone())
            .body(Full::new(Bytes::new()))
            .map_err(|e| e.to_string())?;

        let result = tokio::time::timeout(timeout, async {
            let resp = self.client.request(req).await?;
            let status = resp.status();
            // Drain so the connection can go back to the pool.
            let _ = resp.into_body().collect().await;
            Ok::<_, hyper_util::client::legacy::Error>(status)
        })
        .await;

        match result {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(error_chain(&e)),
            Err(_) => Err(format!("timed out after {timeout:?}")),
        }
    }
}
