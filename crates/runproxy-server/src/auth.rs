//! Static bearer-token check for proxy clients.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::Response;

use crate::context::AppContext;
use crate::error::ProxyError;

/// Extractor that only succeeds for requests carrying
/// `authorization: Bearer <proxy secret>`.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

impl FromRequestParts<AppContext> for Authorized {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(' ').nth(1))
            .unwrap_or_default();

        if key.is_empty() || key != ctx.config().secret {
            return Err(ctx.fail(ProxyError::unauthorized(), &parts.method, &parts.uri));
        }
        Ok(Authorized)
    }
}
