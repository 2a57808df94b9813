//! Streaming relay of an executor response body.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::BoxError;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use hyper::body::Incoming;
use runproxy_core::error_chain;
use thiserror::Error;
use tokio::time::{Instant, Sleep, sleep_until};
use tracing::error;

use crate::classify::{FailureKind, classify_body_error};
use crate::context::AppContext;
use crate::forward::degrade;

#[derive(Debug, Error)]
#[error("executor response exceeded the total timeout")]
pub struct RelayTimeout;

/// State degradation to run if the body fails after the head was sent.
pub struct FailureHook {
    ctx: AppContext,
    hostname: String,
    runtime_id: Option<String>,
}

impl FailureHook {
    pub fn new(ctx: AppContext, hostname: &str, runtime_id: Option<String>) -> Self {
        Self {
            ctx,
            hostname: hostname.to_string(),
            runtime_id,
        }
    }

    fn fire(self, kind: FailureKind, detail: String) {
        error!(hostname = %self.hostname, %kind, "executor response failed mid-stream: {detail}");
        tokio::spawn(async move {
            degrade(
                &self.ctx,
                &self.hostname,
                self.runtime_id.as_deref(),
                kind,
                &detail,
            )
            .await;
        });
    }
}

/// Relays upstream frames as they arrive, bounded by the total deadline.
///
/// Dropping the body (client went away) drops the upstream connection.
pub struct RelayBody {
    inner: Incoming,
    deadline: Pin<Box<Sleep>>,
    hook: Option<FailureHook>,
    done: bool,
}

impl RelayBody {
    pub fn new(inner: Incoming, deadline: Instant, hook: FailureHook) -> Self {
        Self {
            inner,
            deadline: Box::pin(sleep_until(deadline)),
            hook: Some(hook),
            done: false,
        }
    }
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.deadline.as_mut().poll(cx).is_ready() {
            this.done = true;
            if let Some(hook) = this.hook.take() {
                hook.fire(FailureKind::Timeout, RelayTimeout.to_string());
            }
            return Poll::Ready(Some(Err(Box::new(RelayTimeout))));
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                if let Some(hook) = this.hook.take() {
                    hook.fire(classify_body_error(&e), error_chain(&e));
                }
                Poll::Ready(Some(Err(Box::new(e))))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.hook = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        if self.done {
            SizeHint::with_exact(0)
        } else {
            self.inner.size_hint()
        }
    }
}
