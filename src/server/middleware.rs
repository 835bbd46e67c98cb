use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::rate_limit::{retry_after_secs, Admission, RateLimiter};

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_WINDOW: &str = "x-ratelimit-window";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Client key for rate limiting: the peer IP, or `unknown` when the
/// connection info is unavailable.
pub fn client_id(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Sliding-window admission control.
///
/// When an inner limiter already annotated the response its headers are
/// kept, so the most specific limit is the one reported.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_id(&request);
    match limiter.check(&client) {
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            annotate(
                response.headers_mut(),
                &limiter,
                (RATE_LIMIT_REMAINING, remaining as u64),
            );
            response
        }
        Admission::Denied { retry_after } => {
            let secs = retry_after_secs(retry_after);
            log::warn!("Rate limit exceeded for client {client}; retry in {secs}s");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests",
                    "message": format!("Rate limit exceeded. Try again in {secs} seconds."),
                })),
            )
                .into_response();
            annotate(response.headers_mut(), &limiter, ("retry-after", secs));
            response
        }
    }
}

fn annotate(headers: &mut HeaderMap, limiter: &RateLimiter, extra: (&'static str, u64)) {
    if headers.contains_key(RATE_LIMIT_LIMIT) {
        return;
    }
    let values = [
        (RATE_LIMIT_LIMIT, limiter.max_requests() as u64),
        (RATE_LIMIT_WINDOW, limiter.window().as_secs()),
        extra,
    ];
    for (name, value) in values {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
}
