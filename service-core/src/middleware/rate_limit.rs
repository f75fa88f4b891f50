use crate::error::AppError;
use crate::throttle::{Decision, RequestThrottle, ThrottleError};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use std::net::SocketAddr;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Identity used for requests whose origin cannot be determined. They share
/// one bucket rather than bypassing the throttle.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the client identity: first `X-Forwarded-For` hop (when
/// `trust_forwarded_for`), then the peer address, then [`UNKNOWN_CLIENT`].
///
/// The forwarded hop is client-controlled unless a trusted reverse proxy
/// rewrites the header. Services exposed directly should pass `false`.
pub fn client_identity(request: &Request, trust_forwarded_for: bool) -> String {
    let forwarded_ip = request
        .headers()
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<std::net::IpAddr>().ok());

    if let Some(ip) = forwarded_ip {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}

/// Fixed-window admission control for every request passing through.
///
/// Fails closed: if the counter store cannot be consulted the request is
/// rejected with 503, distinct from the 429 returned for an exhausted quota.
pub async fn throttle_middleware(
    State(throttle): State<RequestThrottle>,
    request: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&request, throttle.config().trust_forwarded_for);

    match throttle.admit(&identity).await {
        Ok(decision) if decision.allowed => {
            counter!("throttle_decisions_total", "outcome" => "allowed").increment(1);
            let mut response = next.run(request).await;
            insert_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => {
            counter!("throttle_decisions_total", "outcome" => "rejected").increment(1);
            tracing::warn!(client = %identity, limit = decision.limit, "Rate limit exceeded");
            let mut response = AppError::TooManyRequests(
                "Rate limit exceeded".to_string(),
                Some(decision.retry_after()),
            )
            .into_response();
            insert_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Err(e) => {
            counter!("throttle_decisions_total", "outcome" => "store_error").increment(1);
            tracing::error!(client = %identity, error = %e, "Rate limit check failed");
            let message = match e {
                ThrottleError::Timeout(_) => "rate limit check timed out",
                _ => "rate limit check failed",
            };
            AppError::ServiceUnavailable(message.to_string()).into_response()
        }
    }
}
