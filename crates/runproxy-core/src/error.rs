//! Configuration errors shared by the runproxy crates.

use thiserror::Error;

/// Errors raised while turning configuration strings into typed settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported logging provider: {0}")]
    UnsupportedProvider(String),

    #[error("unsupported state connection: {0}")]
    UnsupportedState(String),

    #[error("invalid connection string: {0}")]
    InvalidDsn(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("tls client setup failed: {0}")]
    Tls(String),
}

/// Render an error with its whole `source()` chain, outermost first.
///
/// HTTP client errors keep the useful part ("connection refused",
/// "dns error") in their sources, not in their own message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !out.ends_with(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = cause.source();
    }
    out
}
