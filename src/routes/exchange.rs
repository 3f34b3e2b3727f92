//! OAuth code-for-token exchange.
//!
//! The only place the client secret is used; the browser never sees it. The
//! resolved token is returned to the caller and deliberately kept out of
//! every log line.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExchangeRequest {
    #[serde(default)]
    #[schema(example = "a1b2c3d4e5f6")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExchangeResponse {
    pub access_token: String,
    pub token_type: String,
}

#[utoipa::path(
    post,
    path = "/auth/exchange-token",
    tag = "Exchange",
    request_body = ExchangeRequest,
    responses(
        (status = 200, description = "Token exchanged", body = ExchangeResponse),
        (status = 400, description = "Missing code or provider rejected it"),
        (status = 502, description = "Provider unreachable or unparseable")
    )
)]
pub async fn exchange_token(
    State(state): State<AppState>,
    Json(payload): Json<ExchangeRequest>,
) -> AppResult<Json<ExchangeResponse>> {
    let code = payload
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::bad_request("Please provide a code in the request body"))?;

    let secret = state
        .config
        .client_secret
        .as_deref()
        .ok_or_else(|| AppError::configuration("PORTAL_CLIENT_SECRET not set"))?;

    let token = state
        .github
        .exchange_code(&state.config.client_id, secret, &code)
        .await?;

    tracing::info!("exchanged authorization code for an access token");
    Ok(Json(ExchangeResponse {
        access_token: token.access_token,
        token_type: token.token_type,
    }))
}
