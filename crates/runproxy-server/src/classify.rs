//! Sorting executor transport failures into what they say about the
//! executor.
//!
//! | Failure | Consequence |
//! |---|---|
//! | resolve, connect, timeout | executor down: offline, usage 100, runtimes wiped |
//! | send, receive, empty response | the runtime failed: `fail`, usage 0 |
//! | anything else | no state change |

use std::error::Error as StdError;
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Resolve,
    Connect,
    Timeout,
    Send,
    Receive,
    EmptyResponse,
    Other,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Resolve => "resolve",
            FailureKind::Connect => "connect",
            FailureKind::Timeout => "timeout",
            FailureKind::Send => "send",
            FailureKind::Receive => "receive",
            FailureKind::EmptyResponse => "empty response",
            FailureKind::Other => "other",
        }
    }

    /// The executor itself is unreachable.
    pub fn executor_down(self) -> bool {
        matches!(
            self,
            FailureKind::Resolve | FailureKind::Connect | FailureKind::Timeout
        )
    }

    /// The executor accepted the connection but the runtime broke.
    pub fn runtime_failed(self) -> bool {
        matches!(
            self,
            FailureKind::Send | FailureKind::Receive | FailureKind::EmptyResponse
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error returned while sending a request and awaiting the
/// response head.
pub fn classify_request_error(err: &hyper_util::client::legacy::Error) -> FailureKind {
    if err.is_connect() {
        return if chain_mentions(err, "dns error") {
            FailureKind::Resolve
        } else {
            FailureKind::Connect
        };
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(e) = cause.downcast_ref::<hyper::Error>() {
            return classify_hyper(e);
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return classify_io(e);
        }
        source = cause.source();
    }
    FailureKind::Other
}

/// Classify an error raised while reading a response body.
pub fn classify_body_error(err: &hyper::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Receive
    }
}

fn classify_hyper(err: &hyper::Error) -> FailureKind {
    if err.is_incomplete_message() {
        FailureKind::EmptyResponse
    } else if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_canceled() || err.is_closed() || err.is_body_write_aborted() {
        FailureKind::Send
    } else if err.is_parse() {
        FailureKind::Receive
    } else {
        match err.source().and_then(|s| s.downcast_ref::<io::Error>()) {
            Some(e) => classify_io(e),
            None => FailureKind::Other,
        }
    }
}

fn classify_io(err: &io::Error) -> FailureKind {
    match err.kind() {
        io::ErrorKind::TimedOut => FailureKind::Timeout,
        io::ErrorKind::BrokenPipe | io::ErrorKind::WriteZero => FailureKind::Send,
        io::ErrorKind::UnexpectedEof => FailureKind::EmptyResponse,
        _ => FailureKind::Receive,
    }
}

fn chain_mentions(err: &(dyn StdError + 'static), needle: &str) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.to_string().contains(needle) {
            return true;
        }
        current = e.source();
    }
    false
}
