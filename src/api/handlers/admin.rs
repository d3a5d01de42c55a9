use crate::api::guard::{AdminSession, SessionIdentity};
use axum::response::Json;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug)]
pub struct AdminMe {
    ok: bool,
    admin: SessionIdentity,
}

#[utoipa::path(
    get,
    path = "/api/admin/me",
    responses (
        (status = 200, description = "Session of the calling admin", body = AdminMe),
        (status = 401, description = "Missing or invalid session token")
    ),
    tag = "admin",
)]
/// Echo the session the guard attached to this request.
pub async fn me(admin: AdminSession) -> Json<AdminMe> {
    Json(AdminMe {
        ok: true,
        admin: admin.identity().clone(),
    })
}
