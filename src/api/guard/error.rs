use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Why a guarded request was turned away.
///
/// All variants answer `401`. Only `MalformedToken` adds a `reason` to the
/// body; missing and badly-signed tokens look identical to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("missing token")]
    MissingToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("invalid token signature")]
    InvalidSignature,
}

impl AuthFailure {
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let body = match self {
            Self::MalformedToken => json!({
                "ok": false,
                "error": "invalid_token",
                "reason": "malformed",
            }),
            Self::MissingToken | Self::InvalidSignature => json!({
                "ok": false,
                "error": "invalid_token",
            }),
        };

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
