//! Live event stream for a tenant.
//!
//! Browsers cannot set headers on `EventSource`, so this prefix accepts the
//! session token as `?token=`.

use crate::api::guard::AuthSession;
use axum::{
    extract::Path,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt, stream};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Serialize, Debug)]
struct Hello<'a> {
    tenant: &'a str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

#[utoipa::path(
    get,
    path = "/api/live/{tenant}",
    params(
        ("tenant" = String, Path, description = "Tenant whose events are streamed"),
        ("token" = Option<String>, Query, description = "Session token for clients that cannot send headers"),
    ),
    responses (
        (status = 200, description = "Server-sent event stream", body = String, content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid session token")
    ),
    tag = "live",
)]
pub async fn live(
    Path(tenant): Path<String>,
    session: AuthSession,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!("live stream opened for tenant {tenant} by {}", session.id);

    let hello = Event::default().event("hello").json_data(Hello {
        tenant: &tenant,
        session_id: &session.id,
    });

    let stream = stream::once(async move { hello }).chain(stream::pending());

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
