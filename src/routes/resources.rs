use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::forms::{render_form, FormDescriptor};
use crate::schema::display_name;
use crate::session::SessionUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceOption {
    pub kind: String,
    pub display_name: String,
}

#[utoipa::path(
    get,
    path = "/resources",
    tag = "Resources",
    responses((status = 200, description = "Resource kinds available to the caller", body = [ResourceOption]))
)]
pub async fn list_resources(SessionUser(session): SessionUser) -> AppResult<Json<Vec<ResourceOption>>> {
    let options = session
        .policy
        .resources
        .iter()
        .map(|kind| ResourceOption {
            kind: kind.clone(),
            display_name: display_name(kind),
        })
        .collect();
    Ok(Json(options))
}

#[utoipa::path(
    get,
    path = "/resources/{kind}/form",
    tag = "Resources",
    params(("kind" = String, Path, description = "Resource kind identifier")),
    responses(
        (status = 200, description = "Constrained form descriptor", body = FormDescriptor),
        (status = 403, description = "Kind not available to the caller's role"),
        (status = 422, description = "Schema missing or malformed")
    )
)]
pub async fn resource_form(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Path(kind): Path<String>,
) -> AppResult<Json<FormDescriptor>> {
    if !session.policy.allows_resource(&kind) {
        return Err(AppError::forbidden(format!(
            "resource kind '{kind}' is not available to your role"
        )));
    }

    let schema = state.github.fetch_schema(&kind).await?;
    Ok(Json(render_form(&kind, &schema, session.role, &session.policy)))
}
