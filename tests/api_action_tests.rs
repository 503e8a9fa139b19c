//! 动作、服务器、身份 API 集成测试

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{create_test_app_state, create_test_config, setup_test_db};

async fn test_app() -> Router {
    let pool = setup_test_db(&create_test_config()).await;
    ops_actions::routes::create_router(create_test_app_state(pool))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_action_crud() {
    let app = test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/actions",
        Some(json!({"name": " Ping ", "command_template": "ping {{host}}"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Ping");
    assert_eq!(created["requires_confirm"], true);
    assert_eq!(created["execution_target"], "local");
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/actions/{}", id),
        Some(json!({
            "name": "Ping",
            "command_template": "ping -c 1 {{host}}",
            "requires_confirm": false,
            "execution_target": "ssh"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["execution_target"], "ssh");

    let (status, list) = send(&app, Method::GET, "/api/v1/actions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/actions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/actions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn test_create_action_validation() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/actions",
        Some(json!({"name": "  ", "command_template": "uptime"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dry_run_through_api() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/servers",
        Some(json!({"name": "Srv1", "hosts": {"internal_primary": "10.0.0.1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, action) = send(
        &app,
        Method::POST,
        "/api/v1/actions",
        Some(json!({"name": "Ping", "command_template": "ping {{host}}", "execution_target": "ssh"})),
    )
    .await;
    let id = action["id"].as_i64().unwrap();

    let (status, run) = send(
        &app,
        Method::POST,
        &format!("/api/v1/actions/{}/run", id),
        Some(json!({"server_name": "Srv1", "dry_run": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "dry_run");
    assert_eq!(run["command_rendered"], "ping 10.0.0.1");
    assert_eq!(run["exit_code"], Value::Null);
    assert_eq!(run["duration_ms"], 0);

    let run_id = run["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["server_name"], "Srv1");

    let (_, history) = send(&app, Method::GET, &format!("/api/v1/actions/{}/runs", id), None).await;
    assert_eq!(history["count"], 1);

    let (_, recent) = send(&app, Method::GET, "/api/v1/runs?limit=5", None).await;
    assert_eq!(recent["count"], 1);
}

#[tokio::test]
async fn test_ssh_run_without_host_is_unprocessable() {
    let app = test_app().await;

    send(
        &app,
        Method::POST,
        "/api/v1/servers",
        Some(json!({"name": "Bare"})),
    )
    .await;
    let (_, action) = send(
        &app,
        Method::POST,
        "/api/v1/actions",
        Some(json!({"name": "Uptime", "command_template": "uptime", "execution_target": "ssh"})),
    )
    .await;
    let id = action["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/actions/{}/run", id),
        Some(json!({"server_name": "Bare"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], 422);

    let (_, recent) = send(&app, Method::GET, "/api/v1/runs", None).await;
    assert_eq!(recent["count"], 0);
}

#[tokio::test]
async fn test_run_unknown_server_is_not_found() {
    let app = test_app().await;

    let (_, action) = send(
        &app,
        Method::POST,
        "/api/v1/actions",
        Some(json!({"name": "Uptime", "command_template": "uptime"})),
    )
    .await;
    let id = action["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/actions/{}/run", id),
        Some(json!({"server_name": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ssh_preview_with_identity() {
    let app = test_app().await;

    send(
        &app,
        Method::POST,
        "/api/v1/servers",
        Some(json!({"name": "Srv1", "hosts": {"internal_primary": "10.0.0.1"}})),
    )
    .await;

    let (status, identity) = send(
        &app,
        Method::POST,
        "/api/v1/identities",
        Some(json!({
            "name": "deploy key",
            "kind": "ssh_key_path",
            "key_path": "/path/to/key",
            "secret": "never-shown"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!identity.to_string().contains("never-shown"));
    let identity_id = identity["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/servers/Srv1/ssh-profile",
        Some(json!({"port": 2222, "identity_id": identity_id, "username_override": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/servers/Srv1/ssh-preview?command=uptime",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let invocation = body["invocation"].as_str().unwrap();
    assert_eq!(
        invocation,
        "ssh -p 2222 -i \"/path/to/key\" admin@10.0.0.1 -o BatchMode=yes -o ConnectTimeout=5 \
         -o StrictHostKeyChecking=accept-new -- uptime"
    );
    assert!(!invocation.contains("never-shown"));

    let (_, identities) = send(&app, Method::GET, "/api/v1/identities", None).await;
    assert!(!identities.to_string().contains("never-shown"));
}

#[tokio::test]
async fn test_duplicate_server_is_conflict() {
    let app = test_app().await;

    let body = json!({"name": "db-01"});
    let (status, _) = send(&app, Method::POST, "/api/v1/servers", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::POST, "/api/v1/servers", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_import_ssh_config_endpoint() {
    let app = test_app().await;
    let content = "Host *\n  User x\nHost web1\n  HostName 10.0.0.5\n  Port 2222\n";

    let (status, preview) = send(
        &app,
        Method::POST,
        "/api/v1/import/ssh-config",
        Some(json!({"content": content, "preview": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["entries"][0]["alias"], "web1");
    assert_eq!(preview["servers_created"], 0);

    let (status, _) = send(&app, Method::GET, "/api/v1/servers/web1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, summary) = send(
        &app,
        Method::POST,
        "/api/v1/import/ssh-config",
        Some(json!({"content": content})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["servers_created"], 1);

    let (status, profile) = send(&app, Method::GET, "/api/v1/servers/web1/ssh-profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["profile"]["port"], 2222);
}
