//! Errors surfaced to proxy clients.
//!
//! Every error renders as `{message, code, version}`; development mode adds
//! `{file, line, trace}`. Only codes from [`PUBLIC_CODES`] reach the
//! client, anything else becomes 500.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use runproxy_core::{ErrorReport, Mode};
use serde::Serialize;
use thiserror::Error;

use crate::classify::FailureKind;

/// Status codes passed through to clients verbatim.
pub const PUBLIC_CODES: [u16; 12] = [400, 401, 402, 403, 404, 406, 409, 412, 425, 429, 501, 503];

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Incorrect proxy key.")]
    Unauthorized,

    #[error("No online executor found")]
    NoTarget,

    #[error("Unexpected error between proxy and executor ID {hostname} ({kind}): {detail}")]
    Upstream {
        hostname: String,
        kind: FailureKind,
        detail: String,
    },

    #[error("{0}")]
    Internal(String),
}

impl ErrorKind {
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 401,
            ErrorKind::NoTarget => 404,
            ErrorKind::Upstream { .. } | ErrorKind::Internal(_) => 500,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NoTarget => "NoTarget",
            ErrorKind::Upstream { .. } => "UpstreamTransport",
            ErrorKind::Internal(_) => "Internal",
        }
    }
}

/// An [`ErrorKind`] plus where it was raised.
#[derive(Debug)]
pub struct ProxyError {
    kind: ErrorKind,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for ProxyError {}

impl From<ErrorKind> for ProxyError {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: Location::caller(),
            backtrace: Backtrace::capture(),
        }
    }
}

impl ProxyError {
    #[track_caller]
    pub fn unauthorized() -> Self {
        ErrorKind::Unauthorized.into()
    }

    #[track_caller]
    pub fn no_target() -> Self {
        ErrorKind::NoTarget.into()
    }

    #[track_caller]
    pub fn upstream(hostname: &str, kind: FailureKind, detail: impl Into<String>) -> Self {
        ErrorKind::Upstream {
            hostname: hostname.to_string(),
            kind,
            detail: detail.into(),
        }
        .into()
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        ErrorKind::Internal(message.into()).into()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Status code sent to the client.
    pub fn code(&self) -> u16 {
        public_code(self.kind.code())
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    pub fn trace(&self) -> String {
        self.backtrace.to_string()
    }

    pub fn report(&self, action: &str, version: &str, mode: Mode) -> ErrorReport {
        ErrorReport::new(action, self.to_string(), version, mode)
            .with_code(self.kind.code())
            .with_error_type(self.type_name())
            .with_location(self.file(), self.line())
            .with_trace(self.trace())
    }

    pub fn body(&self, mode: Mode, version: &str) -> ErrorBody {
        let development = mode.is_development();
        ErrorBody {
            message: self.to_string(),
            code: self.code(),
            version: version.to_string(),
            file: development.then(|| self.file().to_string()),
            line: development.then(|| self.line()),
            trace: development.then(|| self.trace()),
        }
    }

    pub fn render(&self, mode: Mode, version: &str) -> Response {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.body(mode, version))).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub version: String,
}

pub fn public_code(code: u16) -> u16 {
    if PUBLIC_CODES.contains(&code) { code } else { 500 }
}
