//! Verified identities and the request-scoped session handle.
//!
//! The guard stores one [`Session`] in the request extensions. [`AuthSession`]
//! and [`AdminSession`] are two names for that same value; cloning either one
//! only bumps the shared `Arc`.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Serialize, Serializer};
use std::{collections::BTreeSet, ops::Deref, sync::Arc};
use utoipa::ToSchema;

use super::error::AuthFailure;

/// Identity claims taken from a token that passed shape and signature checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPayload {
    pub subject_id: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub token_type: Option<String>,
}

/// Session data exposed to handlers: the payload plus `id`, which always
/// equals `sub`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionIdentity {
    pub id: String,
    pub sub: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    #[serde(rename = "tokenType", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Session(Arc<SessionIdentity>);

impl Session {
    /// Normalize a verified payload into the session handlers see.
    #[must_use]
    pub fn attach(payload: SessionPayload) -> Self {
        let SessionPayload {
            subject_id,
            email,
            roles,
            token_type,
        } = payload;

        Self(Arc::new(SessionIdentity {
            id: subject_id.clone(),
            sub: subject_id,
            email,
            roles,
            token_type,
        }))
    }

    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.0
    }

    /// True when both handles point at the same attached session.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Session {
    type Target = SessionIdentity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for Session {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

fn session_from_parts(parts: &Parts) -> Result<Session, AuthFailure> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthFailure::MissingToken)
}

/// Authenticated identity of the caller.
#[derive(Clone, Debug)]
pub struct AuthSession(pub Session);

/// The same session under the name admin handlers expect.
#[derive(Clone, Debug)]
pub struct AdminSession(pub Session);

impl Deref for AuthSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for AdminSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AuthFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_parts(parts).map(Self)
    }
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AuthFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_parts(parts).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::Request;

    fn payload() -> SessionPayload {
        SessionPayload {
            subject_id: "user-1".to_string(),
            email: "admin@bn88.dev".to_string(),
            roles: ["admin".to_string(), "editor".to_string()].into(),
            token_type: Some("access".to_string()),
        }
    }

    #[test]
    fn attach_derives_id_from_subject() {
        let session = Session::attach(payload());
        assert_eq!(session.id, "user-1");
        assert_eq!(session.sub, "user-1");
        assert_eq!(session.email, "admin@bn88.dev");
        assert!(session.roles.contains("admin"));
        assert!(!session.roles.contains("owner"));
    }

    #[test]
    fn attach_is_deterministic() {
        let first = Session::attach(payload());
        let second = Session::attach(payload());
        assert_eq!(first.identity(), second.identity());
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn serializes_with_token_type_when_present() -> Result<()> {
        let value = serde_json::to_value(Session::attach(payload()))?;
        assert_eq!(
            value,
            serde_json::json!({
                "id": "user-1",
                "sub": "user-1",
                "email": "admin@bn88.dev",
                "roles": ["admin", "editor"],
                "tokenType": "access",
            })
        );

        let mut bare = payload();
        bare.token_type = None;
        bare.roles.clear();
        let value = serde_json::to_value(Session::attach(bare))?;
        assert!(value.get("tokenType").is_none());
        assert_eq!(value.get("roles"), Some(&serde_json::json!([])));
        Ok(())
    }

    #[tokio::test]
    async fn both_extractors_share_one_session() -> Result<()> {
        let session = Session::attach(payload());
        let (mut parts, ()) = Request::builder()
            .uri("/api/admin/me")
            .body(())?
            .into_parts();
        parts.extensions.insert(session.clone());

        let AuthSession(auth) = AuthSession::from_request_parts(&mut parts, &()).await?;
        let AdminSession(admin) = AdminSession::from_request_parts(&mut parts, &()).await?;
        assert!(auth.ptr_eq(&admin));
        assert!(auth.ptr_eq(&session));
        Ok(())
    }

    #[tokio::test]
    async fn extractors_reject_without_session() -> Result<()> {
        let (mut parts, ()) = Request::builder().uri("/").body(())?.into_parts();
        let result = AuthSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthFailure::MissingToken)));
        let result = AdminSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthFailure::MissingToken)));
        Ok(())
    }
}
