use super::handlers::{admin, health, live};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Document for every route the service can mount, admin group included.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, mut openapi) = public_router()
        .merge(live_router())
        .merge(admin_router())
        .split_for_parts();
    openapi.tags = Some(tags());
    openapi
}

// Route groups are kept apart so the guard can wrap each one separately.
// `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.

pub(crate) fn public_router() -> OpenApiRouter {
    OpenApiRouter::with_openapi(cargo_openapi()).routes(routes!(health::health))
}

pub(crate) fn live_router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(live::live))
}

pub(crate) fn admin_router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(admin::me))
}

fn tags() -> Vec<Tag> {
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and build information".to_string());

    let mut live_tag = Tag::new("live");
    live_tag.description = Some("Tenant event streams".to_string());

    let mut admin_tag = Tag::new("admin");
    admin_tag.description = Some("Admin console API".to_string());

    vec![health_tag, live_tag, admin_tag]
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

/// Split `Name <email>` into its parts.
fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => {
            let name = name.trim();
            let email = email.trim_end_matches('>').trim();
            (
                Some(name).filter(|n| !n.is_empty()),
                Some(email).filter(|e| !e.is_empty()),
            )
        }
        None => (Some(author.trim()).filter(|n| !n.is_empty()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.license.map(|license| license.name),
            Some(env!("CARGO_PKG_LICENSE").to_string())
        );
    }

    #[test]
    fn documents_every_mountable_route() {
        let doc = openapi();
        for path in ["/api/health", "/api/live/{tenant}", "/api/admin/me"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let tags: Vec<String> = doc
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(tags, vec!["health", "live", "admin"]);
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("BN88 Team <dev@bn88.dev>"),
            (Some("BN88 Team"), Some("dev@bn88.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
        assert_eq!(parse_author("  "), (None, None));
    }
}
