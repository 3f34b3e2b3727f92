//! Request packaging and submission.
//!
//! Two shapes, selected by the schema's provisioner: a YAML manifest on a
//! fresh branch plus a pull request, or a workflow dispatch with flat string
//! inputs. Both run as straight-line `await` chains; a failed step aborts
//! the remainder and nothing rolls back earlier steps (an orphaned request
//! branch may remain, which is why the raw upstream error is surfaced).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::config::PortalConfig;
use crate::errors::AppError;
use crate::github::GithubClient;
use crate::schema::{display_name, kind_slug, ResourceSchema};
use crate::session::Session;

/// The YAML document committed for pull-request provisioning.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub kind: String,
    pub metadata: ManifestMetadata,
    pub spec: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    pub name: String,
    pub environment: String,
    pub requested_by: String,
}

/// What a successful submission hands back to the UI.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    PullRequest {
        number: u64,
        url: String,
    },
    /// Dispatch APIs return no run id synchronously, so the acknowledgement
    /// is generic and links to the workflow-runs view.
    WorkflowDispatch {
        message: String,
        runs_url: String,
    },
}

pub fn build_manifest(
    kind: &str,
    name: &str,
    environment: &str,
    requested_by: &str,
    values: &Map<String, Value>,
) -> Manifest {
    Manifest {
        kind: kind.to_string(),
        metadata: ManifestMetadata {
            name: name.to_string(),
            environment: environment.to_string(),
            requested_by: requested_by.to_string(),
        },
        spec: values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    }
}

pub fn manifest_yaml(manifest: &Manifest) -> Result<String, AppError> {
    serde_yaml::to_string(manifest)
        .map_err(|err| AppError::internal(format!("failed to serialize manifest: {err}")))
}

/// Unique request branch: kind slug plus a millisecond timestamp suffix.
pub fn branch_name(kind: &str, at: DateTime<Utc>) -> String {
    format!("request/{}-{}", kind_slug(kind), at.timestamp_millis())
}

/// Deterministic manifest location, keyed by kind, name and environment.
pub fn manifest_path(kind: &str, name: &str, environment: &str) -> String {
    format!("requests/{}/{name}-{environment}.yml", kind_slug(kind))
}

pub fn commit_message(path: &str) -> String {
    format!("Add infrastructure request for {path}")
}

pub fn pr_title(kind: &str, name: &str, environment: &str) -> String {
    format!("Request: {kind} - {name} ({environment})")
}

pub fn pr_body(kind: &str, name: &str, environment: &str, requested_by: &str) -> String {
    format!(
        "Infrastructure request by {requested_by}\n\n\
         Resource: {kind}\n\
         Name: {name}\n\
         Environment: {environment}"
    )
}

/// Flattens a submission into workflow-dispatch inputs.
///
/// Inputs are strings only. Every schema field is included when the
/// submission or the schema default provides a value; booleans fall back to
/// `"false"` so an unchecked toggle still dispatches explicitly.
pub fn dispatch_inputs(
    schema: &ResourceSchema,
    name: &str,
    environment: &str,
    values: &Map<String, Value>,
) -> BTreeMap<String, String> {
    let mut inputs = BTreeMap::new();
    inputs.insert("environment".to_string(), environment.to_string());
    inputs.insert("resourceName".to_string(), name.to_string());

    for field in schema.flattened_fields() {
        let value = values.get(field.name).or(field.spec.default.as_ref());
        let rendered = match value {
            Some(value) => scalar_string(value),
            None if field.spec.is_boolean() => Some("false".to_string()),
            None => None,
        };
        if let Some(rendered) = rendered {
            inputs.insert(field.name.to_string(), rendered);
        }
    }

    inputs
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Branch -> file -> pull request. Each step can fail independently and
/// aborts the rest; prior steps are not rolled back.
pub async fn submit_pull_request(
    github: &GithubClient,
    config: &PortalConfig,
    session: &Session,
    kind: &str,
    name: &str,
    environment: &str,
    values: &Map<String, Value>,
) -> Result<SubmissionOutcome, AppError> {
    let manifest = build_manifest(kind, name, environment, &session.login, values);
    let yaml = manifest_yaml(&manifest)?;

    let repo = &config.config_repo;
    let base = &config.default_branch;

    let head_sha = github.branch_head_sha(&session.credential, repo, base).await?;
    let branch = branch_name(kind, Utc::now());
    github
        .create_branch(&session.credential, repo, &branch, &head_sha)
        .await?;

    let path = manifest_path(kind, name, environment);
    github
        .create_file(
            &session.credential,
            repo,
            &path,
            &yaml,
            &branch,
            &commit_message(&path),
        )
        .await?;

    let pull = github
        .create_pull_request(
            &session.credential,
            repo,
            &branch,
            base,
            &pr_title(kind, name, environment),
            &pr_body(kind, name, environment, &session.login),
        )
        .await?;

    tracing::info!(number = pull.number, %branch, "opened provisioning pull request");
    Ok(SubmissionOutcome::PullRequest {
        number: pull.number,
        url: pull.html_url,
    })
}

pub async fn submit_workflow_dispatch(
    github: &GithubClient,
    config: &PortalConfig,
    session: &Session,
    schema: &ResourceSchema,
    workflow: &str,
    kind: &str,
    name: &str,
    environment: &str,
    values: &Map<String, Value>,
) -> Result<SubmissionOutcome, AppError> {
    let inputs = dispatch_inputs(schema, name, environment, values);
    github
        .dispatch_workflow(
            &session.credential,
            &config.config_repo,
            workflow,
            &config.default_branch,
            &inputs,
        )
        .await?;

    tracing::info!(%workflow, "dispatched provisioning workflow");
    Ok(SubmissionOutcome::WorkflowDispatch {
        message: format!("{} request submitted for provisioning", display_name(kind)),
        runs_url: format!(
            "{}/{}/actions/workflows/{workflow}",
            config.github_oauth_base.trim_end_matches('/'),
            config.config_repo
        ),
    })
}
