mod common;

use anyhow::Result;
use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use common::{
    get_json, login, mock_github, mock_repo_pr_flow, post_json, spawn_server, test_config, Recorder,
    GOOD_TOKEN,
};
use infra_portal::create_app;

#[tokio::test]
async fn full_pull_request_flow() -> Result<()> {
    let recorder = Recorder::default();
    let mock = mock_github(vec!["cie-team"]).merge(mock_repo_pr_flow(recorder.clone()));
    let base = spawn_server(mock).await;
    let app = create_app(test_config(&base)).await?;

    // -- login as an admin-team member
    let (status, body) = post_json(&app, "/auth/login", None, json!({ "token": GOOD_TOKEN })).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    assert_eq!(body["login"], "octocat");
    assert_eq!(body["role"], "admin");
    let session = body["token"].as_str().unwrap().to_string();

    // -- identity endpoint reflects the session
    let (status, body) = get_json(&app, "/auth/me", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], "octocat");
    assert_eq!(body["role"], "admin");

    // -- resource kinds come from the team policy, with display names
    let (status, body) = get_json(&app, "/resources", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["ServiceBus", "StorageAccount", "SqlDatabase"]);
    assert_eq!(body[1]["display_name"], "Storage Account");

    // -- form descriptor flattens the nested network section
    let (status, form) = get_json(&app, "/resources/StorageAccount/form", Some(&session)).await;
    assert_eq!(status, StatusCode::OK, "form failed: {form}");
    assert_eq!(form["title"], "Create Storage Account");
    let fields = form["fields"].as_array().unwrap();
    let default_action = fields
        .iter()
        .find(|f| f["name"] == "defaultAction")
        .expect("flattened field");
    assert_eq!(default_action["section"], "Network Configuration");
    assert_eq!(default_action["widget"]["kind"], "choice");

    // admin sees every environment, never an approval notice
    let environments = form["environments"].as_array().unwrap();
    assert_eq!(environments.len(), 3);
    assert!(environments.iter().all(|e| e["requires_approval"] == false));

    // -- submit: branch, manifest file, then pull request
    let (status, outcome) = post_json(
        &app,
        "/requests",
        Some(&session),
        json!({
            "resource": "StorageAccount",
            "name": "foo",
            "environment": "dev",
            "values": {
                "accountTier": "Standard",
                "defaultAction": "Deny"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "submit failed: {outcome}");
    assert_eq!(outcome["type"], "pull_request");
    assert_eq!(outcome["number"], 42);
    assert_eq!(outcome["url"], "https://github.com/acme/infra-config/pull/42");

    // branch name is kind slug plus a timestamp suffix
    let branch_body = recorder.find("create_branch").expect("branch recorded");
    let git_ref = branch_body["ref"].as_str().unwrap();
    assert!(
        git_ref.starts_with("refs/heads/request/storage-account-"),
        "unexpected ref: {git_ref}"
    );
    assert_eq!(branch_body["sha"], "abc123");

    // the committed manifest round-trips the submitted values
    let file_body = recorder
        .find("create_file:requests/storage-account/foo-dev.yml")
        .expect("file recorded at the deterministic path");
    assert_eq!(
        file_body["message"],
        "Add infrastructure request for requests/storage-account/foo-dev.yml"
    );
    let content = BASE64.decode(file_body["content"].as_str().unwrap())?;
    let manifest: serde_yaml::Value = serde_yaml::from_slice(&content)?;
    assert_eq!(manifest["kind"].as_str(), Some("StorageAccount"));
    assert_eq!(manifest["metadata"]["name"].as_str(), Some("foo"));
    assert_eq!(manifest["metadata"]["environment"].as_str(), Some("dev"));
    assert_eq!(manifest["metadata"]["requestedBy"].as_str(), Some("octocat"));
    assert_eq!(manifest["spec"]["accountTier"].as_str(), Some("Standard"));
    assert_eq!(manifest["spec"]["defaultAction"].as_str(), Some("Deny"));

    // the pull request targets the default branch from the request branch
    let pull_body = recorder.find("create_pull").expect("pull recorded");
    assert_eq!(pull_body["base"], "main");
    assert!(pull_body["head"]
        .as_str()
        .unwrap()
        .starts_with("request/storage-account-"));
    assert_eq!(pull_body["title"], "Request: StorageAccount - foo (dev)");
    assert!(pull_body["body"]
        .as_str()
        .unwrap()
        .contains("Infrastructure request by octocat"));

    Ok(())
}

#[tokio::test]
async fn requests_require_a_session() -> Result<()> {
    let base = spawn_server(mock_github(vec!["cie-team"])).await;
    let app = create_app(test_config(&base)).await?;

    let (status, _) = get_json(&app, "/resources", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_json(&app, "/resources", Some("not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/requests",
        None,
        json!({ "resource": "ServiceBus", "name": "x", "environment": "dev" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn viewer_sees_no_resources() -> Result<()> {
    let base = spawn_server(mock_github(vec!["unrelated-team"])).await;
    let app = create_app(test_config(&base)).await?;

    let session = login(&app, GOOD_TOKEN).await;
    let (status, body) = get_json(&app, "/resources", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    Ok(())
}
