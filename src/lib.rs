//! # BN88 (Request Authentication & Routing Bootstrap)
//!
//! `bn88` is the HTTP front of the BN88 multi-tenant admin/bot backend. It owns
//! the request pipeline that every protected HTTP and streaming request passes
//! through before it reaches a business handler.
//!
//! ## Credential Resolution
//!
//! Every guarded request carries at most one credential, picked by strict
//! precedence:
//!
//! 1. **`Authorization` header.** Any non-blank header wins outright. A header
//!    that is not a `Bearer` scheme resolves to an empty token and is rejected;
//!    it never falls back to the cookie or query string.
//! 2. **`?token=` query parameter.** Only honored for allow-listed path prefixes
//!    (realtime streams and the admin embed-content endpoint), because browsers
//!    cannot attach headers to `EventSource` or `<img>` requests.
//! 3. **`bn88_token` cookie.**
//!
//! ## Verification
//!
//! Tokens are HS256 JWTs. A token is checked for its three-segment shape before
//! any signature work happens, so malformed input gets a distinguishable
//! `reason: "malformed"` rejection and never costs an HMAC.
//!
//! ## Sessions
//!
//! A verified token becomes a [`api::guard::Session`] placed once in the request
//! extensions. Handlers read it through either [`api::guard::AuthSession`] or
//! [`api::guard::AdminSession`]; both resolve to the same shared value.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
