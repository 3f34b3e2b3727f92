#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::{self, Body};
use axum::extract::Path;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use infra_portal::config::PortalConfig;

/// Credential the mock GitHub accepts; anything else gets a 401.
pub const GOOD_TOKEN: &str = "gho_goodtoken";

pub const PERMISSIONS_YML: &str = r#"teams:
  cie-team:
    role: admin
    environments: [dev, test, prod]
    resources: [ServiceBus, StorageAccount, SqlDatabase]
  epo-team:
    role: contributor
    environments: [dev, test]
    resources: [ServiceBus]
    approval_required:
      test: true
    limitations:
      ServiceBus:
        maxSizeInMegabytes: 1024
        messageRetention: ["1", "3", "7"]
"#;

pub const SERVICE_BUS_SCHEMA: &str = r#"{
  "title": "Service Bus Topic",
  "provisioner": { "workflow_dispatch": { "workflow": "provision-servicebus.yml" } },
  "properties": {
    "messageRetention": { "title": "Message Retention (days)", "enum": ["1", "3", "7", "14"], "default": "7" },
    "maxSizeInMegabytes": { "title": "Max Size (MB)", "type": "number", "minimum": 256, "maximum": 5120, "default": 1024 },
    "requiresDuplicateDetection": { "title": "Duplicate Detection", "type": "boolean", "default": false }
  }
}"#;

pub const STORAGE_ACCOUNT_SCHEMA: &str = r#"{
  "title": "Storage Account",
  "provisioner": "pull_request",
  "properties": {
    "accountTier": { "enum": ["Standard", "Premium"], "default": "Standard" },
    "accountReplicationType": { "enum": ["LRS", "GRS", "ZRS"], "default": "LRS" },
    "httpsTrafficOnlyEnabled": { "type": "boolean", "default": true },
    "networkRuleSet": {
      "type": "object",
      "title": "Network Configuration",
      "properties": {
        "defaultAction": { "enum": ["Allow", "Deny"], "default": "Deny" },
        "bypass": { "enum": ["AzureServices", "None"], "default": "AzureServices" }
      }
    }
  }
}"#;

/// Captures mock request bodies for later assertions.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<(String, Value)>>>);

impl Recorder {
    pub fn push(&self, label: &str, body: Value) {
        self.0.lock().unwrap().push((label.to_string(), body));
    }

    pub fn find(&self, label: &str) -> Option<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|(l, _)| l.starts_with(label))
            .map(|(_, body)| body.clone())
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
    }
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {GOOD_TOKEN}"))
        .unwrap_or(false)
}

/// Mock of the GitHub API surface the portal talks to, plus the static site
/// under `/site`. Pass the team memberships the identity should have.
pub fn mock_github(teams: Vec<&'static str>) -> Router {
    Router::new()
        .route(
            "/user",
            get(|headers: HeaderMap| async move {
                if bearer_ok(&headers) {
                    (StatusCode::OK, Json(json!({ "login": "octocat" })))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })))
                }
            }),
        )
        .route(
            "/user/teams",
            get(move |headers: HeaderMap| {
                let teams = teams.clone();
                async move {
                    if bearer_ok(&headers) {
                        let list: Vec<Value> = teams.iter().map(|t| json!({ "name": t })).collect();
                        (StatusCode::OK, Json(Value::Array(list)))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })))
                    }
                }
            }),
        )
        .route("/site/config/permissions.yml", get(|| async { PERMISSIONS_YML }))
        .route(
            "/site/config/resource-templates/service-bus/schema.json",
            get(|| async { SERVICE_BUS_SCHEMA }),
        )
        .route(
            "/site/config/resource-templates/storage-account/schema.json",
            get(|| async { STORAGE_ACCOUNT_SCHEMA }),
        )
}

/// Happy-path repo endpoints for the pull-request flow, recording bodies.
pub fn mock_repo_pr_flow(recorder: Recorder) -> Router {
    Router::new()
        .route(
            "/repos/acme/infra-config/git/ref/heads/main",
            get(|| async { Json(json!({ "object": { "sha": "abc123" } })) }),
        )
        .route(
            "/repos/acme/infra-config/git/refs",
            post({
                let recorder = recorder.clone();
                move |Json(body): Json<Value>| {
                    let recorder = recorder.clone();
                    async move {
                        recorder.push("create_branch", body);
                        (StatusCode::CREATED, Json(json!({ "ref": "created" })))
                    }
                }
            }),
        )
        .route(
            "/repos/acme/infra-config/contents/*path",
            put({
                let recorder = recorder.clone();
                move |Path(path): Path<String>, Json(body): Json<Value>| {
                    let recorder = recorder.clone();
                    async move {
                        recorder.push(&format!("create_file:{path}"), body);
                        (StatusCode::CREATED, Json(json!({ "content": {} })))
                    }
                }
            }),
        )
        .route(
            "/repos/acme/infra-config/pulls",
            post({
                let recorder = recorder.clone();
                move |Json(body): Json<Value>| {
                    let recorder = recorder.clone();
                    async move {
                        recorder.push("create_pull", body);
                        (
                            StatusCode::CREATED,
                            Json(json!({
                                "number": 42,
                                "html_url": "https://github.com/acme/infra-config/pull/42"
                            })),
                        )
                    }
                }
            }),
        )
}

/// Serves a router on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener addr");
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("serve mock");
    });
    format!("http://{addr}")
}

/// Portal configuration pointing every base URL at the mock server.
pub fn test_config(base: &str) -> PortalConfig {
    PortalConfig {
        github_api_base: base.to_string(),
        github_oauth_base: base.to_string(),
        site_base: format!("{base}/site"),
        client_id: "test-client-id".to_string(),
        client_secret: Some("test-client-secret".to_string()),
        redirect_uri: format!("{base}/auth/github/callback"),
        site_origin: None,
        config_repo: "acme/infra-config".to_string(),
        default_branch: "main".to_string(),
        admin_team: "cie-team".to_string(),
        contributor_team: "epo-team".to_string(),
        app_port: 0,
    }
}

pub async fn get_json(app: &Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).expect("request");
    send(app, req).await
}

pub async fn post_json(app: &Router, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::from(body.to_string())).expect("request");
    send(app, req).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Logs in with a PAT and returns the portal session token.
pub async fn login(app: &Router, token: &str) -> String {
    let (status, body) = post_json(app, "/auth/login", None, json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("session token").to_string()
}
