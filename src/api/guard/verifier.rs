//! Token verification: structural check, then signature and claims.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::BTreeSet, fmt};
use tracing::error;

use super::{error::AuthFailure, session::SessionPayload};

/// Number of `.`-separated segments in a compact JWS (header.payload.signature).
pub const TOKEN_SEGMENTS: usize = 3;

/// Cause of a failed signature/claims check. Logged, never returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token expired")]
    Expired,
    #[error("token not valid yet")]
    ImmatureSignature,
    #[error("signature mismatch")]
    InvalidSignature,
    #[error("unexpected signing algorithm")]
    InvalidAlgorithm,
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
}

/// Cryptographic half of token verification.
///
/// Implementations only see tokens that already have three segments.
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    /// Returns a [`VerifyError`] when the signature, expiry, or claims are not acceptable.
    fn verify(&self, token: &str) -> Result<SessionPayload, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default, rename = "tokenType")]
    token_type: Option<String>,
}

/// HS256 verifier backed by a shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &"HS256")
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // No audience is configured, so an `aud` claim is accepted as is.
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Seconds of clock skew tolerated for `exp`/`nbf` (default 60).
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<SessionPayload, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::ImmatureSignature => VerifyError::ImmatureSignature,
                ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => VerifyError::InvalidAlgorithm,
                _ => VerifyError::InvalidClaims(err.to_string()),
            }
        })?;

        let Claims {
            sub,
            email,
            roles,
            token_type,
        } = data.claims;

        if sub.trim().is_empty() {
            return Err(VerifyError::InvalidClaims("empty subject".to_string()));
        }

        Ok(SessionPayload {
            subject_id: sub,
            email,
            roles,
            token_type,
        })
    }
}

/// Run the shape check and then the signature check.
///
/// Empty tokens and tokens without exactly three segments are rejected before
/// `verifier` is called.
///
/// # Errors
/// Returns the [`AuthFailure`] the guard should answer with.
pub fn verify_token(
    verifier: &dyn TokenVerifier,
    token: &str,
) -> Result<SessionPayload, AuthFailure> {
    if token.is_empty() {
        return Err(AuthFailure::MissingToken);
    }

    if token.split('.').count() != TOKEN_SEGMENTS {
        return Err(AuthFailure::MalformedToken);
    }

    verifier.verify(token).map_err(|err| {
        error!("auth guard rejected token: {err}");
        AuthFailure::InvalidSignature
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const TEST_SECRET: &str = "test-secret-key-32-bytes-long!!!";

    pub(crate) fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    pub(crate) fn sign(claims: &Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap_or_default()
    }

    pub(crate) fn valid_token(sub: &str) -> String {
        sign(
            &json!({
                "sub": sub,
                "email": format!("{sub}@bn88.dev"),
                "roles": ["admin"],
                "tokenType": "access",
                "exp": now() + 3600,
            }),
            TEST_SECRET,
        )
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&SecretString::from(TEST_SECRET))
    }

    /// Counts calls so tests can prove the signature step was skipped.
    #[derive(Default)]
    pub(crate) struct CountingVerifier {
        pub(crate) calls: AtomicUsize,
    }

    impl TokenVerifier for CountingVerifier {
        fn verify(&self, _token: &str) -> Result<SessionPayload, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VerifyError::InvalidSignature)
        }
    }

    #[test]
    fn valid_token_yields_payload() -> anyhow::Result<()> {
        let payload = verifier().verify(&valid_token("user-1"))?;
        assert_eq!(payload.subject_id, "user-1");
        assert_eq!(payload.email, "user-1@bn88.dev");
        assert!(payload.roles.contains("admin"));
        assert_eq!(payload.token_type.as_deref(), Some("access"));
        Ok(())
    }

    #[test]
    fn roles_and_token_type_are_optional() -> anyhow::Result<()> {
        let token = sign(
            &json!({ "sub": "u2", "email": "u2@bn88.dev", "exp": now() + 60 }),
            TEST_SECRET,
        );
        let payload = verifier().verify(&token)?;
        assert!(payload.roles.is_empty());
        assert!(payload.token_type.is_none());
        Ok(())
    }

    #[test]
    fn audience_claim_is_not_checked() -> anyhow::Result<()> {
        let token = sign(
            &json!({
                "sub": "u4",
                "email": "u4@bn88.dev",
                "aud": "bn88-admin",
                "exp": now() + 60,
            }),
            TEST_SECRET,
        );
        let payload = verifier().verify(&token)?;
        assert_eq!(payload.subject_id, "u4");
        Ok(())
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let token = sign(
            &json!({ "sub": "u", "email": "u@bn88.dev", "exp": now() + 60 }),
            "different-secret-key-32-bytes!!!",
        );
        assert_eq!(
            verifier().verify(&token),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(
            &json!({ "sub": "u", "email": "u@bn88.dev", "exp": now() - 3600 }),
            TEST_SECRET,
        );
        assert_eq!(verifier().verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn future_nbf_is_rejected() {
        let token = sign(
            &json!({
                "sub": "u",
                "email": "u@bn88.dev",
                "exp": now() + 7200,
                "nbf": now() + 3600,
            }),
            TEST_SECRET,
        );
        assert_eq!(
            verifier().verify(&token),
            Err(VerifyError::ImmatureSignature)
        );
    }

    #[test]
    fn missing_email_is_invalid_claims() {
        let token = sign(&json!({ "sub": "u", "exp": now() + 60 }), TEST_SECRET);
        assert!(matches!(
            verifier().verify(&token),
            Err(VerifyError::InvalidClaims(_))
        ));
    }

    #[test]
    fn missing_exp_is_invalid_claims() {
        let token = sign(&json!({ "sub": "u", "email": "u@bn88.dev" }), TEST_SECRET);
        assert!(matches!(
            verifier().verify(&token),
            Err(VerifyError::InvalidClaims(_))
        ));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &json!({ "sub": "u", "email": "u@bn88.dev", "exp": now() + 60 }),
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap_or_default();
        assert_eq!(
            verifier().verify(&token),
            Err(VerifyError::InvalidAlgorithm)
        );
    }

    #[test]
    fn empty_token_is_missing() {
        let counting = CountingVerifier::default();
        assert_eq!(verify_token(&counting, ""), Err(AuthFailure::MissingToken));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wrong_segment_counts_never_reach_the_verifier() {
        let counting = CountingVerifier::default();
        for token in ["abc", "a.b", "a.b.c.d", "a.b.c.d.e", ".."] {
            let expected = if token == ".." {
                // Three empty segments still pass the shape check.
                Err(AuthFailure::InvalidSignature)
            } else {
                Err(AuthFailure::MalformedToken)
            };
            assert_eq!(verify_token(&counting, token), expected, "token: {token}");
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn verifier_failures_collapse_to_invalid_signature() {
        let counting = CountingVerifier::default();
        assert_eq!(
            verify_token(&counting, "a.b.c"),
            Err(AuthFailure::InvalidSignature)
        );
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains(TEST_SECRET));
    }
}
