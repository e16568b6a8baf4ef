//! Request logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Paths polled by load balancers and monitors; logged at debug level.
const HEALTH_PATHS: [&str; 2] = ["/health", "/queue/health"];

/// Logs method, path, status, and latency of every request.
///
/// Server errors are logged at warn level. Health-check requests drop to debug so
/// they do not drown out queue traffic.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, latency_ms, "Request failed");
    } else if HEALTH_PATHS.contains(&path.as_str()) {
        tracing::debug!(%method, %path, status, latency_ms, "Health check request");
    } else {
        tracing::info!(%method, %path, status, latency_ms, "HTTP request");
    }

    response
}
