use axum::response::{IntoResponse, Redirect};

// axum handler for root
pub async fn root() -> impl IntoResponse {
    "ok"
}

/// Legacy probe path; the JSON health document lives under `/api`.
pub async fn health_redirect() -> Redirect {
    Redirect::permanent("/api/health")
}
