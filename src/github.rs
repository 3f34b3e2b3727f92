//! GitHub REST/OAuth client plus the static-site fetches.
//!
//! Every network call the portal makes goes through here. Base URLs come
//! from configuration so tests can point the client at a local server.
//! 401 responses map to `AppError::Unauthorized` so callers can discard the
//! session; other failures keep the upstream body verbatim because that text
//! is the operator's only cleanup breadcrumb.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::authz::PermissionDocument;
use crate::config::PortalConfig;
use crate::errors::AppError;
use crate::schema::{kind_slug, ResourceSchema};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    site_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubTeam {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

impl GithubClient {
    pub fn new(config: &PortalConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("infra-portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            api_base: config.github_api_base.trim_end_matches('/').to_string(),
            oauth_base: config.github_oauth_base.trim_end_matches('/').to_string(),
            site_base: config.site_base.trim_end_matches('/').to_string(),
        })
    }

    /// Trades an OAuth authorization code for an access token.
    ///
    /// A provider-reported error (expired or reused code) is the client's
    /// fault and comes back as `BadRequest`; transport and parse failures
    /// are `Upstream`. The resolved token is never logged.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .header(header::ACCEPT, "application/json")
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(transport)?;

        let payload: Value = response.json().await.map_err(transport)?;
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            let description = payload
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or(error);
            return Err(AppError::bad_request(description));
        }

        serde_json::from_value(payload)
            .map_err(|err| AppError::upstream(format!("malformed token response: {err}")))
    }

    pub async fn fetch_user(&self, token: &str) -> Result<GithubUser, AppError> {
        self.api_get(token, "/user").await
    }

    pub async fn fetch_teams(&self, token: &str) -> Result<Vec<GithubTeam>, AppError> {
        self.api_get(token, "/user/teams").await
    }

    pub async fn branch_head_sha(&self, token: &str, repo: &str, branch: &str) -> Result<String, AppError> {
        let git_ref: GitRef = self
            .api_get(token, &format!("/repos/{repo}/git/ref/heads/{branch}"))
            .await?;
        Ok(git_ref.object.sha)
    }

    pub async fn create_branch(&self, token: &str, repo: &str, branch: &str, sha: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/repos/{repo}/git/refs", self.api_base))
            .bearer_auth(token)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .json(&json!({
                "ref": format!("refs/heads/{branch}"),
                "sha": sha,
            }))
            .send()
            .await
            .map_err(transport)?;
        expect_success(response).await
    }

    pub async fn create_file(
        &self,
        token: &str,
        repo: &str,
        path: &str,
        content: &str,
        branch: &str,
        message: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .put(format!("{}/repos/{repo}/contents/{path}", self.api_base))
            .bearer_auth(token)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .json(&json!({
                "message": message,
                "content": BASE64.encode(content),
                "branch": branch,
            }))
            .send()
            .await
            .map_err(transport)?;
        expect_success(response).await
    }

    pub async fn create_pull_request(
        &self,
        token: &str,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, AppError> {
        let response = self
            .http
            .post(format!("{}/repos/{repo}/pulls", self.api_base))
            .bearer_auth(token)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .json(&json!({
                "title": title,
                "body": body,
                "head": head,
                "base": base,
            }))
            .send()
            .await
            .map_err(transport)?;
        expect_json(response).await
    }

    pub async fn dispatch_workflow(
        &self,
        token: &str,
        repo: &str,
        workflow: &str,
        ref_branch: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!(
                "{}/repos/{repo}/actions/workflows/{workflow}/dispatches",
                self.api_base
            ))
            .bearer_auth(token)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .json(&json!({
                "ref": ref_branch,
                "inputs": inputs,
            }))
            .send()
            .await
            .map_err(transport)?;
        expect_success(response).await
    }

    /// Fetches and parses the team permission document.
    pub async fn fetch_permissions(&self) -> Result<PermissionDocument, AppError> {
        let response = self
            .http
            .get(format!("{}/config/permissions.yml", self.site_base))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(format!(
                "Unable to fetch permissions file: {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(transport)?;
        serde_yaml::from_str(&text)
            .map_err(|err| AppError::validation(format!("failed to parse permission document: {err}")))
    }

    /// Fetches and parses one resource kind's schema. Both a missing file
    /// and a malformed one are rendering failures, scoped to the kind.
    pub async fn fetch_schema(&self, kind: &str) -> Result<ResourceSchema, AppError> {
        let slug = kind_slug(kind);
        let response = self
            .http
            .get(format!(
                "{}/config/resource-templates/{slug}/schema.json",
                self.site_base
            ))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::validation(format!(
                "failed to load schema for {kind}: HTTP {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(transport)?;
        serde_json::from_str(&text)
            .map_err(|err| AppError::validation(format!("failed to parse schema for {kind}: {err}")))
    }

    async fn api_get<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(token)
            .header(header::ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(transport)?;
        expect_json(response).await
    }
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::upstream(format!("request failed: {err}"))
}

async fn expect_success(response: reqwest::Response) -> Result<(), AppError> {
    let status = response.status();
    if status.as_u16() == 401 {
        return Err(AppError::unauthorized("GitHub rejected the credential"));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::upstream(format!(
            "GitHub API error ({}): {body}",
            status.as_u16()
        )));
    }
    Ok(())
}

async fn expect_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if status.as_u16() == 401 {
        return Err(AppError::unauthorized("GitHub rejected the credential"));
    }
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(AppError::upstream(format!(
            "GitHub API error ({}): {body}",
            status.as_u16()
        )));
    }
    serde_json::from_str(&body)
        .map_err(|err| AppError::upstream(format!("malformed GitHub response: {err}")))
}
