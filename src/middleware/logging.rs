//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, latency, and
//! whether the caller presented a bearer credential. The token itself is
//! never logged.

use crate::auth::middleware::{parse_bearer, BearerToken};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Middleware that logs HTTP requests with timing information.
///
/// 5xx responses log at WARN, everything else at INFO. Health checks are skipped.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path == "/health" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let bearer = {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        matches!(parse_bearer(header), BearerToken::Present(_))
    };

    let span = tracing::info_span!("http_request", method = %method, path = %path, bearer);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    span.in_scope(|| match status {
        s if s >= 500 => warn!(status, latency_ms, "Request failed (5xx)"),
        s if s >= 400 => info!(status, latency_ms, "Request completed (4xx)"),
        _ => info!(status, latency_ms, "Request completed"),
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_logging_passes_responses_through() {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/health", get(|| async { "up" }))
            .layer(axum::middleware::from_fn(request_logging));

        for (uri, expected) in [
            ("/ok", StatusCode::OK),
            ("/boom", StatusCode::INTERNAL_SERVER_ERROR),
            ("/health", StatusCode::OK),
            ("/missing", StatusCode::NOT_FOUND),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .header(AUTHORIZATION, "Bearer abc")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{uri}");
        }
    }
}
