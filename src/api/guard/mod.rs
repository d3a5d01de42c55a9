//! Request authentication guard.
//!
//! Flow Overview:
//! 1) Locate the single credential for the request ([`TokenLocator`]).
//! 2) Reject empty tokens, then tokens that are not three `.`-separated segments.
//! 3) Verify signature and claims ([`TokenVerifier`]).
//! 4) Attach a [`Session`] to the request extensions and call the next handler.
//!
//! Every rejection is a `401`. The guard keeps no state between requests; the
//! locator policy, verifier key, and diagnostics sink are read-only after start.

mod config;
mod diagnostics;
mod error;
mod locator;
mod session;
mod verifier;

pub use config::AuthConfig;
pub use diagnostics::{
    AuthDiagnostics, DiagnosticReason, DiagnosticRecord, NoopDiagnostics, TracingDiagnostics,
    diagnostics_for,
};
pub use error::AuthFailure;
pub use locator::{
    Credential, DEFAULT_SESSION_COOKIE_NAME, QUERY_TOKEN_ALLOWED_PREFIXES, QueryTokenAllowList,
    TokenLocator, TokenSource,
};
pub use session::{AdminSession, AuthSession, Session, SessionIdentity, SessionPayload};
pub use verifier::{JwtVerifier, TOKEN_SEGMENTS, TokenVerifier, VerifyError, verify_token};

use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{fmt, sync::Arc};
use tracing::debug;

pub struct AuthGuard {
    locator: TokenLocator,
    verifier: Arc<dyn TokenVerifier>,
    diagnostics: Arc<dyn AuthDiagnostics>,
}

impl fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGuard")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl AuthGuard {
    #[must_use]
    pub fn new(
        locator: TokenLocator,
        verifier: Arc<dyn TokenVerifier>,
        diagnostics: Arc<dyn AuthDiagnostics>,
    ) -> Self {
        Self {
            locator,
            verifier,
            diagnostics,
        }
    }

    #[must_use]
    pub fn locator(&self) -> &TokenLocator {
        &self.locator
    }

    /// Decide whether a request may proceed, producing its session.
    ///
    /// `uri` must be the full request URI (not one stripped by nesting), since
    /// the query-token allow-list matches on the complete path.
    ///
    /// # Errors
    /// Returns the [`AuthFailure`] to answer with when the request is rejected.
    pub fn authenticate(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Session, AuthFailure> {
        let credential = self.locator.locate(headers, uri);
        let report = |reason: DiagnosticReason| {
            let record = DiagnosticRecord::new(method, uri, headers, &credential);
            self.diagnostics.record(reason, &record);
        };

        if credential.query_provided
            && !credential.query_allowed
            && credential.source == TokenSource::None
        {
            report(DiagnosticReason::QueryTokenNotAllowed);
        }

        match verify_token(self.verifier.as_ref(), &credential.token) {
            Ok(payload) => Ok(Session::attach(payload)),
            Err(failure) => {
                report(failure.into());
                Err(failure)
            }
        }
    }
}

/// Middleware wrapping a route group with the guard.
///
/// Mount with `axum::middleware::from_fn_with_state(guard, require_session)`.
pub async fn require_session(
    State(guard): State<Arc<AuthGuard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().clone(), |original| original.0.clone());

    match guard.authenticate(request.method(), &uri, request.headers()) {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(failure) => {
            debug!(reason = failure.reason(), "auth guard rejected request");
            failure.into_response()
        }
    }
}
