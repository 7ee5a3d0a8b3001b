//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus recorder and return the handle that renders it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "bcast_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "bcast_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "bcast_http_requests_in_flight";

    // Composition endpoints
    pub const COMPOSE_REQUESTS_TOTAL: &str = "bcast_compose_requests_total";

    // Story runs started over HTTP
    pub const STORY_RUNS_TOTAL: &str = "bcast_story_runs_total";
    pub const STORY_RUNS_ACTIVE: &str = "bcast_story_runs_active";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "bcast_rate_limit_hits_total";
}

static STORY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/api/stories/[^/]+").unwrap());
static GENERATED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/generated/([a-z]+)/.+$").unwrap());

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a composition request: `mux`, `snapshot` or `concat`.
pub fn record_compose_request(operation: &str, outcome: &str) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::COMPOSE_REQUESTS_TOTAL, &labels).increment(1);
}

/// Record the end state of a detached story run.
pub fn record_story_run(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::STORY_RUNS_TOTAL, &labels).increment(1);
}

pub fn set_active_story_runs(count: usize) {
    gauge!(names::STORY_RUNS_ACTIVE).set(count as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse story IDs and asset file names so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = STORY_PATH.replace(path, "/api/stories/:story_id");
    GENERATED_PATH
        .replace(&path, "/generated/$1/:file")
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/api/stories/geese-2024"), "/api/stories/:story_id");
        assert_eq!(
            sanitize_path("/generated/videos/final_geese.mp4"),
            "/generated/videos/:file"
        );
        assert_eq!(sanitize_path("/api/compose/mux"), "/api/compose/mux");
    }
}
