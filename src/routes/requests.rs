use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::forms::{render_form, validate_submission};
use crate::schema::Provisioner;
use crate::session::SessionUser;
use crate::submit::{submit_pull_request, submit_workflow_dispatch, SubmissionOutcome};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Resource kind identifier, e.g. `ServiceBus`.
    pub resource: String,
    pub name: String,
    pub environment: String,
    /// Remaining form fields, keyed by field name.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub values: Map<String, Value>,
}

#[utoipa::path(
    post,
    path = "/requests",
    tag = "Requests",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Request submitted", body = SubmissionOutcome),
        (status = 403, description = "Kind not available to the caller's role"),
        (status = 422, description = "Submission violates the rendered constraints"),
        (status = 502, description = "GitHub rejected a provisioning step; raw error included")
    )
)]
pub async fn submit_request(
    State(state): State<AppState>,
    SessionUser(session): SessionUser,
    Json(payload): Json<SubmitRequest>,
) -> AppResult<Json<SubmissionOutcome>> {
    if !session.policy.allows_resource(&payload.resource) {
        return Err(AppError::forbidden(format!(
            "resource kind '{}' is not available to your role",
            payload.resource
        )));
    }

    let schema = state.github.fetch_schema(&payload.resource).await?;

    // The rendered descriptor is the validation gate: whatever constraints
    // the form showed are re-checked here against the submitted values.
    let form = render_form(&payload.resource, &schema, session.role, &session.policy);
    validate_submission(&form, &payload.name, &payload.environment, &payload.values)?;

    let outcome = match &schema.provisioner {
        Provisioner::PullRequest => {
            submit_pull_request(
                &state.github,
                &state.config,
                &session,
                &payload.resource,
                &payload.name,
                &payload.environment,
                &payload.values,
            )
            .await
        }
        Provisioner::WorkflowDispatch { workflow } => {
            submit_workflow_dispatch(
                &state.github,
                &state.config,
                &session,
                &schema,
                workflow,
                &payload.resource,
                &payload.name,
                &payload.environment,
                &payload.values,
            )
            .await
        }
    };

    match outcome {
        // A rejected credential invalidates the session before the error is
        // surfaced, so the caller cannot keep hammering with a dead token.
        Err(err @ AppError::Unauthorized(_)) => {
            state.sessions.remove(session.id).await;
            Err(err)
        }
        other => other.map(Json),
    }
}
