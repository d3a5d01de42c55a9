//! Opt-in auth diagnostics.
//!
//! The guard always hands its rejection context to an [`AuthDiagnostics`]
//! sink. Whether anything is written is decided once at startup by picking
//! [`TracingDiagnostics`] or [`NoopDiagnostics`].

use axum::http::{HeaderMap, Method, Uri};
use std::sync::Arc;
use tracing::info;

use super::{
    error::AuthFailure,
    locator::{Credential, TokenSource},
};

const TENANT_HEADER: &str = "x-tenant";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticReason {
    QueryTokenNotAllowed,
    MissingToken,
    MalformedToken,
    InvalidSignature,
}

impl DiagnosticReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryTokenNotAllowed => "query_token_not_allowed",
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
        }
    }
}

impl From<AuthFailure> for DiagnosticReason {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::MissingToken => Self::MissingToken,
            AuthFailure::MalformedToken => Self::MalformedToken,
            AuthFailure::InvalidSignature => Self::InvalidSignature,
        }
    }
}

/// Context of one auth decision. Holds no token material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// `METHOD /path`, query string excluded.
    pub route: String,
    pub tenant: Option<String>,
    pub has_auth_header: bool,
    pub auth_header_prefix: Option<String>,
    pub token_parts_count: usize,
    pub token_source: TokenSource,
    pub query_provided: bool,
    pub query_allowed: bool,
}

impl DiagnosticRecord {
    #[must_use]
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, credential: &Credential) -> Self {
        let tenant = headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|tenant| !tenant.is_empty())
            .map(str::to_string);

        Self {
            route: format!("{method} {}", uri.path()),
            tenant,
            has_auth_header: credential.source == TokenSource::Header,
            auth_header_prefix: credential.header_scheme().map(str::to_string),
            token_parts_count: credential.segment_count(),
            token_source: credential.source,
            query_provided: credential.query_provided,
            query_allowed: credential.query_allowed,
        }
    }
}

pub trait AuthDiagnostics: Send + Sync {
    fn record(&self, reason: DiagnosticReason, record: &DiagnosticRecord);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDiagnostics;

impl AuthDiagnostics for NoopDiagnostics {
    fn record(&self, _reason: DiagnosticReason, _record: &DiagnosticRecord) {}
}

/// Writes one structured `info` event per record under `bn88::auth::debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl AuthDiagnostics for TracingDiagnostics {
    fn record(&self, reason: DiagnosticReason, record: &DiagnosticRecord) {
        info!(
            target: "bn88::auth::debug",
            reason = reason.as_str(),
            route = %record.route,
            tenant = record.tenant.as_deref(),
            has_auth_header = record.has_auth_header,
            auth_header_prefix = record.auth_header_prefix.as_deref(),
            token_parts_count = record.token_parts_count,
            token_source = record.token_source.as_str(),
            query_provided = record.query_provided,
            query_allowed = record.query_allowed,
            "DEBUG_AUTH"
        );
    }
}

/// Sink for the configured diagnostics toggle.
#[must_use]
pub fn diagnostics_for(enabled: bool) -> Arc<dyn AuthDiagnostics> {
    if enabled {
        Arc::new(TracingDiagnostics)
    } else {
        Arc::new(NoopDiagnostics)
    }
}
