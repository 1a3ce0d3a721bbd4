//! `X-API-Key` / `Authorization: Bearer` check for all `/v1` routes.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde_json::json;

#[derive(Clone)]
pub struct ApiKeyState {
    pub api_key: String,
}

pub async fn require_api_key(
    State(state): State<ApiKeyState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    match provided {
        Some(key) if key == state.api_key => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response(),
    }
}

use axum::response::IntoResponse;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

pub async fn trace_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = req
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(trace_id.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(
        TRACE_ID_HEADER,
        axum::http::HeaderValue::from_str(&trace_id)
            .unwrap_or_else(|_| axum::http::HeaderValue::from_static("invalid")),
    );
    res
}
