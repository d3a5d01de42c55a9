//! Auth guard configuration and assembly.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::{
    AuthGuard,
    diagnostics::diagnostics_for,
    locator::{DEFAULT_SESSION_COOKIE_NAME, TokenLocator},
    verifier::JwtVerifier,
};
use crate::api::routes::RouteTable;

const DEFAULT_LEEWAY_SECONDS: u64 = 60;

#[derive(Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    cookie_name: String,
    debug_auth: bool,
    routes: RouteTable,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            debug_auth: false,
            routes: RouteTable::default(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: String) -> Self {
        self.cookie_name = cookie_name;
        self
    }

    #[must_use]
    pub fn with_debug_auth(mut self, enabled: bool) -> Self {
        self.debug_auth = enabled;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn debug_auth(&self) -> bool {
        self.debug_auth
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// False for an empty or whitespace-only secret.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.jwt_secret.expose_secret().trim().is_empty()
    }

    /// Build the guard: JWT verifier from the secret, locator from the route
    /// table, diagnostics from the debug toggle.
    #[must_use]
    pub fn build_guard(&self) -> AuthGuard {
        let locator = TokenLocator::new(self.routes.query_token_allow_list())
            .with_cookie_name(self.cookie_name.clone());
        let verifier = JwtVerifier::new(&self.jwt_secret).with_leeway(DEFAULT_LEEWAY_SECONDS);

        AuthGuard::new(locator, Arc::new(verifier), diagnostics_for(self.debug_auth))
    }
}
