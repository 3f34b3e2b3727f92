use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::derive_role;
use crate::errors::{AppError, AppResult};
use crate::session::{Session, SessionUser};

const OAUTH_SCOPE: &str = "repo read:org";

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizeResponse {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenLoginRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Opaque session token for the `Authorization: Bearer` header.
    pub token: Uuid,
    pub login: String,
    pub role: crate::authz::Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    pub login: String,
    pub role: crate::authz::Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    get,
    path = "/auth/authorize",
    tag = "Auth",
    responses((status = 200, description = "Authorize URL with CSRF state", body = AuthorizeResponse))
)]
pub async fn authorize(State(state): State<AppState>) -> AppResult<Json<AuthorizeResponse>> {
    let csrf = state.states.issue().await.to_string();

    let url = reqwest::Url::parse_with_params(
        &format!("{}/login/oauth/authorize", state.config.github_oauth_base.trim_end_matches('/')),
        &[
            ("client_id", state.config.client_id.as_str()),
            ("redirect_uri", state.config.redirect_uri.as_str()),
            ("scope", OAUTH_SCOPE),
            ("state", csrf.as_str()),
        ],
    )
    .map_err(|err| AppError::internal(format!("failed to build authorize URL: {err}")))?;

    Ok(Json(AuthorizeResponse {
        url: url.into(),
        state: csrf,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/callback",
    tag = "Auth",
    request_body = CallbackRequest,
    responses(
        (status = 200, description = "Session established", body = SessionResponse),
        (status = 400, description = "State mismatch or rejected code"),
        (status = 401, description = "Credential rejected")
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackRequest>,
) -> AppResult<Json<SessionResponse>> {
    if !state.states.consume(&payload.state).await {
        return Err(AppError::bad_request(
            "Security error: State parameter mismatch",
        ));
    }

    let secret = state
        .config
        .client_secret
        .as_deref()
        .ok_or_else(|| AppError::configuration("PORTAL_CLIENT_SECRET not set"))?;

    let token = state
        .github
        .exchange_code(&state.config.client_id, secret, &payload.code)
        .await?;

    resolve_session(&state, token.access_token).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = TokenLoginRequest,
    responses(
        (status = 200, description = "Session established", body = SessionResponse),
        (status = 401, description = "Credential rejected")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<TokenLoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    resolve_session(&state, payload.token).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current identity", body = IdentityResponse))
)]
pub async fn me(SessionUser(session): SessionUser) -> AppResult<Json<IdentityResponse>> {
    Ok(Json(IdentityResponse {
        login: session.login,
        role: session.role,
    }))
}

/// Idempotent: removes the session if the bearer header names one, succeeds
/// either way.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<MessageResponse>> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| token.parse::<Uuid>().ok());

    if let Some(id) = bearer {
        state.sessions.remove(id).await;
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Resolves identity and team membership for a credential, derives the role
/// and takes the policy snapshot. The identity and membership fetches are
/// issued concurrently and joined.
async fn resolve_session(state: &AppState, credential: String) -> AppResult<SessionResponse> {
    let (user, teams) = tokio::try_join!(
        state.github.fetch_user(&credential),
        state.github.fetch_teams(&credential),
    )?;

    let role = derive_role(
        teams.iter().map(|team| team.name.as_str()),
        &state.config.admin_team,
        &state.config.contributor_team,
    );

    let document = state.github.fetch_permissions().await?;
    let policy = document.policy_for_role(role, &state.config.admin_team, &state.config.contributor_team);

    let session = Session::new(credential, user.login.clone(), role, policy);
    let token = session.id;
    state.sessions.insert(session).await;

    tracing::info!(login = %user.login, %role, "session established");
    Ok(SessionResponse {
        token,
        login: user.login,
        role,
    })
}
