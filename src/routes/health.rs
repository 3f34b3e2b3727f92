use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub permissions_ok: bool,
    pub permissions_error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    // Lightweight reachability probe of the permission document
    match state.github.fetch_permissions().await {
        Ok(_) => Ok(Json(HealthResponse {
            status: "ok",
            permissions_ok: true,
            permissions_error: None,
        })),
        Err(err) => Ok(Json(HealthResponse {
            status: "ok",
            permissions_ok: false,
            permissions_error: Some(err.to_string()),
        })),
    }
}
