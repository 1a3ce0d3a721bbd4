use axum::http::StatusCode;

/// Liveness only — the pipeline's correctness does not depend on the
/// Ingress knowing whether the database is reachable right now; a failing
/// DB call already surfaces as a 5xx on the affected request.
pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
