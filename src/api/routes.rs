//! Route mount table.
//!
//! One row per mounted path prefix: whether the auth guard wraps it, whether
//! `?token=` credentials are accepted there, and whether the `/api` rate
//! limiter counts it. Lookups use the longest matching prefix.

use std::sync::Arc;

use super::guard::QueryTokenAllowList;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountPoint {
    pub prefix: String,
    pub guarded: bool,
    pub query_token_allowed: bool,
    pub rate_limited: bool,
}

impl MountPoint {
    #[must_use]
    pub fn public(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            guarded: false,
            query_token_allowed: false,
            rate_limited: true,
        }
    }

    #[must_use]
    pub fn guarded(prefix: impl Into<String>) -> Self {
        Self {
            guarded: true,
            ..Self::public(prefix)
        }
    }

    #[must_use]
    pub fn with_query_token(mut self) -> Self {
        self.query_token_allowed = true;
        self
    }

    #[must_use]
    pub fn without_rate_limit(mut self) -> Self {
        self.rate_limited = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    mounts: Arc<[MountPoint]>,
}

impl RouteTable {
    #[must_use]
    pub fn new(mounts: Vec<MountPoint>) -> Self {
        Self {
            mounts: mounts.into(),
        }
    }

    /// Longest registered prefix of `path`, if any.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&MountPoint> {
        self.mounts
            .iter()
            .filter(|mount| path.starts_with(mount.prefix.as_str()))
            .max_by_key(|mount| mount.prefix.len())
    }

    #[must_use]
    pub fn is_guarded(&self, path: &str) -> bool {
        self.lookup(path).is_some_and(|mount| mount.guarded)
    }

    /// Paths outside the table are counted.
    #[must_use]
    pub fn is_rate_limited(&self, path: &str) -> bool {
        self.lookup(path).is_none_or(|mount| mount.rate_limited)
    }

    /// Prefixes that accept query-string credentials, for the token locator.
    #[must_use]
    pub fn query_token_allow_list(&self) -> QueryTokenAllowList {
        QueryTokenAllowList::new(
            self.mounts
                .iter()
                .filter(|mount| mount.guarded && mount.query_token_allowed)
                .map(|mount| mount.prefix.clone()),
        )
    }

    /// The same table without the mounts under `prefix`.
    #[must_use]
    pub fn without_prefix(&self, prefix: &str) -> Self {
        Self::new(
            self.mounts
                .iter()
                .filter(|mount| !mount.prefix.starts_with(prefix))
                .cloned()
                .collect(),
        )
    }

    pub fn mounts(&self) -> impl Iterator<Item = &MountPoint> {
        self.mounts.iter()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            MountPoint::public("/api/health").without_rate_limit(),
            MountPoint::public("/api/webhooks/").without_rate_limit(),
            MountPoint::public("/api/events").without_rate_limit(),
            MountPoint::guarded("/api/live/")
                .with_query_token()
                .without_rate_limit(),
            MountPoint::guarded("/api/admin"),
            MountPoint::guarded("/api/admin/chat").without_rate_limit(),
            MountPoint::guarded("/api/admin/chat/line-content/")
                .with_query_token()
                .without_rate_limit(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::guard::QUERY_TOKEN_ALLOWED_PREFIXES;

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::default();
        let chat = table.lookup("/api/admin/chat/threads");
        assert_eq!(chat.map(|m| m.prefix.as_str()), Some("/api/admin/chat"));
        let embed = table.lookup("/api/admin/chat/line-content/99");
        assert!(embed.is_some_and(|m| m.query_token_allowed));
        let admin = table.lookup("/api/admin/me");
        assert!(admin.is_some_and(|m| m.guarded && !m.query_token_allowed));
    }

    #[test]
    fn guard_and_rate_limit_flags() {
        let table = RouteTable::default();
        assert!(table.is_guarded("/api/live/tenant1"));
        assert!(table.is_guarded("/api/admin/me"));
        assert!(!table.is_guarded("/api/health"));
        assert!(!table.is_guarded("/api/bots"));

        assert!(table.is_rate_limited("/api/admin/me"));
        assert!(table.is_rate_limited("/api/bots"));
        assert!(!table.is_rate_limited("/api/health"));
        assert!(!table.is_rate_limited("/api/live/tenant1"));
        assert!(!table.is_rate_limited("/api/admin/chat/list"));
        assert!(!table.is_rate_limited("/api/webhooks/line"));
    }

    #[test]
    fn without_prefix_drops_nested_mounts() {
        let table = RouteTable::default().without_prefix("/api/admin");
        assert!(!table.is_guarded("/api/admin/me"));
        assert!(!table.is_guarded("/api/admin/chat/line-content/1"));
        assert!(table.is_guarded("/api/live/tenant1"));
        assert!(table.mounts().all(|m| !m.prefix.starts_with("/api/admin")));
    }

    #[test]
    fn default_allow_list_matches_locator_constants() {
        let allow_list = RouteTable::default().query_token_allow_list();
        assert_eq!(allow_list, QueryTokenAllowList::default());
        let prefixes: Vec<&str> = allow_list.prefixes().collect();
        assert_eq!(prefixes, QUERY_TOKEN_ALLOWED_PREFIXES);
    }

    #[test]
    fn query_tokens_never_enabled_on_public_mounts() {
        let table = RouteTable::new(vec![
            MountPoint::public("/api/bots").with_query_token(),
            MountPoint::guarded("/api/live/").with_query_token(),
        ]);
        let allow_list = table.query_token_allow_list();
        assert!(!allow_list.allows("/api/bots"));
        assert!(allow_list.allows("/api/live/x"));
    }
}
