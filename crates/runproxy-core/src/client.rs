//! HTTP clients: the executor client used for probes and relayed traffic,
//! and a TLS-capable client for outbound calls to third-party URLs.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::error::ConfigError;

/// Pooled HTTP/1 client with a full-buffered request body.
pub type ExecutorClient = Client<HttpConnector, Full<Bytes>>;

/// Like [`ExecutorClient`], but also speaks `https://`.
pub type WebClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

fn http_connector(connect_timeout: Duration) -> HttpConnector {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    connector
}

/// Build the executor client with the given TCP connect timeout.
pub fn build_client(connect_timeout: Duration) -> ExecutorClient {
    Client::builder(TokioExecutor::new()).build(http_connector(connect_timeout))
}

/// Build a client for `http://` and `https://` URLs, verifying servers
/// against the Mozilla root store.
pub fn build_web_client(connect_timeout: Duration) -> Result<WebClient, ConfigError> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ConfigError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    let mut http = http_connector(connect_timeout);
    http.enforce_http(false);
    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Ok(Client::builder(TokioExecutor::new()).build(connector))
}
