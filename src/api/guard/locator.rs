//! Credential resolution.
//!
//! Flow Overview: look at the `Authorization` header first, then an
//! allow-listed `?token=` query parameter, then the session cookie. The first
//! source that is present wins; a present-but-wrong `Authorization` header
//! still wins and resolves to an empty token so the guard rejects it.

use axum::http::{
    HeaderMap, Uri,
    header::{AUTHORIZATION, COOKIE},
};
use std::{fmt, sync::Arc};

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "bn88_token";

/// Prefixes where credentials may travel in the query string.
///
/// `EventSource` and embedded media cannot set headers, so these are the only
/// endpoints that accept `?token=`.
pub const QUERY_TOKEN_ALLOWED_PREFIXES: &[&str] = &["/api/live/", "/api/admin/chat/line-content/"];

const QUERY_TOKEN_PARAM: &str = "token";
const BEARER_PREFIX: &str = "bearer ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
    Query,
    None,
}

impl TokenSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Query => "query",
            Self::None => "none",
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved authentication attempt for one request.
///
/// `raw_header` is only kept for diagnostics (its scheme word); it is never
/// logged in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub raw_header: String,
    pub source: TokenSource,
    pub query_provided: bool,
    pub query_allowed: bool,
}

impl Credential {
    fn none(query_provided: bool, query_allowed: bool) -> Self {
        Self {
            token: String::new(),
            raw_header: String::new(),
            source: TokenSource::None,
            query_provided,
            query_allowed,
        }
    }

    /// Number of `.`-separated segments, `0` for an empty token.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        if self.token.is_empty() {
            0
        } else {
            self.token.split('.').count()
        }
    }

    /// First word of the `Authorization` header (e.g. `Bearer`), if one was used.
    #[must_use]
    pub fn header_scheme(&self) -> Option<&str> {
        if self.source == TokenSource::Header {
            self.raw_header.split_whitespace().next()
        } else {
            None
        }
    }
}

// Tokens stay out of Debug output so a stray `{:?}` can't leak them.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("segments", &self.segment_count())
            .field("source", &self.source)
            .field("query_provided", &self.query_provided)
            .field("query_allowed", &self.query_allowed)
            .finish()
    }
}

/// Path prefixes where query-string credentials are accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTokenAllowList {
    prefixes: Arc<[String]>,
}

impl QueryTokenAllowList {
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        let path = path.trim();
        self.prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

impl Default for QueryTokenAllowList {
    fn default() -> Self {
        Self::new(QUERY_TOKEN_ALLOWED_PREFIXES.iter().copied())
    }
}

#[derive(Clone, Debug)]
pub struct TokenLocator {
    allow_list: QueryTokenAllowList,
    cookie_name: String,
}

impl TokenLocator {
    #[must_use]
    pub fn new(allow_list: QueryTokenAllowList) -> Self {
        Self {
            allow_list,
            cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    #[must_use]
    pub fn allow_list(&self) -> &QueryTokenAllowList {
        &self.allow_list
    }

    /// Pick the single credential this request authenticates with.
    #[must_use]
    pub fn locate(&self, headers: &HeaderMap, uri: &Uri) -> Credential {
        if let Some(raw) = read_authorization(headers) {
            let token = bearer_token(&raw).unwrap_or_default();
            return Credential {
                token,
                raw_header: raw,
                source: TokenSource::Header,
                query_provided: false,
                query_allowed: false,
            };
        }

        let query_token = uri.query().and_then(read_query_token);
        let query_provided = query_token.is_some();
        let query_allowed = query_provided && self.allow_list.allows(uri.path());

        if let Some(token) = query_token.filter(|_| query_allowed) {
            return Credential {
                token,
                raw_header: String::new(),
                source: TokenSource::Query,
                query_provided,
                query_allowed,
            };
        }

        if let Some(token) = read_cookie(headers, &self.cookie_name) {
            return Credential {
                token,
                raw_header: String::new(),
                source: TokenSource::Cookie,
                query_provided,
                query_allowed,
            };
        }

        Credential::none(query_provided, query_allowed)
    }
}

impl Default for TokenLocator {
    fn default() -> Self {
        Self::new(QueryTokenAllowList::default())
    }
}

/// Trimmed `Authorization` header, `None` when missing or blank.
fn read_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?;
    // Non-visible-ASCII headers are still "present"; keep what we can decode.
    let raw = String::from_utf8_lossy(value.as_bytes());
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn bearer_token(raw: &str) -> Option<String> {
    let scheme = raw.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    Some(raw[BEARER_PREFIX.len()..].trim().to_string())
}

/// First `token` query value, trimmed; repeated parameters use the first one.
fn read_query_token(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == QUERY_TOKEN_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}
