use crate::{GIT_COMMIT_HASH, api::ApiConfig};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    ok: bool,
    /// RFC 3339 timestamp of the probe.
    time: String,
    #[serde(rename = "adminApi")]
    admin_api: bool,
    name: String,
    version: String,
    commit: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses (
        (status = 200, description = "Service is up", body = Health)
    ),
    tag = "health",
)]
// axum handler for health
pub async fn health(config: Extension<Arc<ApiConfig>>) -> impl IntoResponse {
    let health = Health {
        ok: true,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        admin_api: config.admin_api(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    (StatusCode::OK, headers, Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_admin_flag_and_build_info() -> anyhow::Result<()> {
        let config = Arc::new(ApiConfig::default().with_admin_api(true));
        let app = Router::new()
            .route("/api/health", get(health))
            .layer(Extension(config));

        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-app"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: Value = serde_json::from_slice(&body)?;
        assert_eq!(json["ok"], true);
        assert_eq!(json["adminApi"], true);
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        let time = json["time"].as_str().unwrap_or_default();
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
        Ok(())
    }
}
