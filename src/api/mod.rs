//! HTTP surface: router assembly, the request pipeline, and serving.
//!
//! Pipeline, outer to inner: request id and trace span, security headers,
//! CORS, compression, body limit, `/api` rate limiting, the auth guard on
//! every prefix the mount table marks as guarded, handlers. Unknown `/api`
//! paths get a JSON 404.

use crate::api::{
    guard::{AuthConfig, AuthGuard, require_session},
    handlers::root,
    rate_limit::{FixedWindowRateLimiter, RateLimitState, RateLimiter, rate_limit},
    routes::RouteTable,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath, State},
    http::{
        HeaderName, HeaderValue, Method, Request, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, debug, error, info, info_span};
use ulid::Ulid;

pub mod guard;
pub(crate) mod handlers;
mod openapi;
pub mod rate_limit;
pub mod routes;

pub use openapi::openapi;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;
const ADMIN_PREFIX: &str = "/api/admin";

/// Server-level settings that are not part of authentication.
#[derive(Clone, Debug, Default)]
pub struct ApiConfig {
    admin_api: bool,
    allowed_origins: Vec<HeaderValue>,
}

impl ApiConfig {
    #[must_use]
    pub fn with_admin_api(mut self, enabled: bool) -> Self {
        self.admin_api = enabled;
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<HeaderValue>) -> Self {
        self.allowed_origins = origins;
        self
    }

    #[must_use]
    pub fn admin_api(&self) -> bool {
        self.admin_api
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &[HeaderValue] {
        &self.allowed_origins
    }
}

/// Everything the router needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub guard: Arc<AuthGuard>,
    pub limiter: Arc<dyn RateLimiter>,
    pub routes: RouteTable,
}

impl AppState {
    #[must_use]
    pub fn new(config: ApiConfig, auth: &AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
            guard: Arc::new(auth.build_guard()),
            limiter: Arc::new(FixedWindowRateLimiter::default()),
            routes: auth.routes().clone(),
        }
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }
}

#[derive(Clone)]
struct GuardedMounts {
    guard: Arc<AuthGuard>,
    routes: RouteTable,
}

/// Run the auth guard on every path under a guarded prefix, matched or not.
async fn guard_mounts(
    State(mounts): State<GuardedMounts>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    if mounts.routes.is_guarded(request.uri().path()) {
        require_session(State(mounts.guard), request, next).await
    } else {
        next.run(request).await
    }
}

/// Build the full application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    let (mut api, _) = openapi::public_router()
        .merge(openapi::live_router())
        .split_for_parts();

    // Admin prefixes are neither served nor guarded while the admin API is off.
    let guarded_routes = if state.config.admin_api() {
        let (admin, _) = openapi::admin_router().split_for_parts();
        api = api.merge(admin);
        state.routes.clone()
    } else {
        state.routes.without_prefix(ADMIN_PREFIX)
    };

    let guarded = GuardedMounts {
        guard: state.guard.clone(),
        routes: guarded_routes,
    };

    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-tenant"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(AllowOrigin::list(state.config.allowed_origins().to_vec()))
        .allow_credentials(true);

    let limits = RateLimitState {
        limiter: state.limiter.clone(),
        routes: state.routes.clone(),
    };

    api.route("/", get(root::root))
        .route("/health", get(root::health_redirect))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("cross-origin-resource-policy"),
                    HeaderValue::from_static("cross-origin"),
                ))
                .layer(cors)
                // The default predicate skips `text/event-stream`.
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
                .layer(middleware::from_fn_with_state(limits, rate_limit))
                .layer(middleware::from_fn_with_state(guarded, guard_mounts))
                .layer(Extension(state.config.clone())),
        )
}

async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api") {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "message": "not_found" })),
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn listen_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(host: &str, port: u16, config: ApiConfig, auth: &AuthConfig) -> Result<()> {
    let state = AppState::new(config, auth);
    debug!(
        cookie = auth.cookie_name(),
        debug_auth = auth.debug_auth(),
        "auth guard configured"
    );
    for mount in state.routes.mounts() {
        debug!(
            prefix = %mount.prefix,
            guarded = mount.guarded,
            query_token = mount.query_token_allowed,
            rate_limited = mount.rate_limited,
            "route mount"
        );
    }

    let app = app(state);

    let address = listen_address(host, port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
