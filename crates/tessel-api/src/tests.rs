use std::sync::Arc;

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tessel_ext::{APPS_ROOT, ExtensionCatalog, MemoryVfs, Vfs, VfsFile};
use tessel_store_sqlite::{ScriptTable, SqliteStore};
use tower::ServiceExt;

use crate::{ApiState, api_router};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let scripts = ScriptTable::open(store).await.unwrap();

  let vfs = MemoryVfs::new();
  vfs.add_dir(&[], "extensions").await.unwrap();
  vfs.add_dir(&["extensions"], "apps").await.unwrap();
  vfs.add_dir(&APPS_ROOT, "kanban").await.unwrap();
  vfs
    .add_file(
      &["extensions", "apps", "kanban"],
      VfsFile::new("package.json", r#"{ "eidos": { "name": "Kanban", "version": "1.0.0" } }"#),
    )
    .await
    .unwrap();
  vfs
    .add_file(&["extensions", "apps", "kanban"], VfsFile::new("index.html", "<main/>"))
    .await
    .unwrap();

  api_router(Arc::new(ApiState::new(scripts, ExtensionCatalog::new(vfs))))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
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
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

fn script(id: &str, kind: &str) -> Value {
  json!({ "id": id, "name": id, "type": kind, "enabled": true })
}

#[tokio::test]
async fn create_stores_disabled_script() {
  let app = app().await;

  let (status, body) = send(&app, "POST", "/scripts", Some(script("s1", "script"))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["enabled"], false);

  let (status, body) = send(&app, "GET", "/scripts/s1", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["type"], "script");
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
  let app = app().await;
  send(&app, "POST", "/scripts", Some(script("s1", "script"))).await;

  let (status, body) = send(&app, "POST", "/scripts", Some(script("s1", "udf"))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_script_is_404() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/scripts/ghost", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("ghost"));

  let (status, _) = send(&app, "POST", "/scripts/ghost/enable", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enable_disable_and_filter() {
  let app = app().await;
  for (id, kind) in [("a", "script"), ("b", "block"), ("c", "prompt")] {
    send(&app, "POST", "/scripts", Some(script(id, kind))).await;
  }

  let (status, body) = send(&app, "POST", "/scripts/b/enable", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["enabled"], true);
  send(&app, "POST", "/scripts/b/enable", None).await;

  let (_, enabled) = send(&app, "GET", "/scripts?status=enabled", None).await;
  assert_eq!(enabled.as_array().unwrap().len(), 1);
  let (_, disabled) = send(&app, "GET", "/scripts?status=disabled", None).await;
  assert_eq!(disabled.as_array().unwrap().len(), 2);
  let (_, all) = send(&app, "GET", "/scripts", None).await;
  assert_eq!(all.as_array().unwrap().len(), 3);

  let (_, blocks) = send(&app, "GET", "/scripts/blocks", None).await;
  assert_eq!(blocks[0]["id"], "b");

  let (status, body) = send(&app, "POST", "/scripts/b/disable", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["enabled"], false);
}

#[tokio::test]
async fn unknown_status_is_bad_request() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/scripts?status=paused", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn env_map_is_replaced() {
  let app = app().await;
  send(&app, "POST", "/scripts", Some(script("s1", "script"))).await;

  send(&app, "PUT", "/scripts/s1/env", Some(json!({ "A": "1", "B": "2" }))).await;
  let (status, body) = send(&app, "PUT", "/scripts/s1/env", Some(json!({ "C": "3" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["env_map"], json!({ "C": "3" }));
}

#[tokio::test]
async fn delete_reports_existence() {
  let app = app().await;
  send(&app, "POST", "/scripts", Some(script("s1", "script"))).await;

  let (_, first) = send(&app, "DELETE", "/scripts/s1", None).await;
  let (_, second) = send(&app, "DELETE", "/scripts/s1", None).await;
  assert_eq!(first, json!({ "deleted": true }));
  assert_eq!(second, json!({ "deleted": false }));
}

#[tokio::test]
async fn lists_extensions() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/extensions", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([{
    "id": "Kanban",
    "name": "Kanban",
    "version": "1.0.0",
    "description": "",
    "displayMode": "full"
  }]));
}

#[tokio::test]
async fn serves_extension_index() {
  let app = app().await;
  let request = Request::builder().uri("/extensions/kanban/index").body(Body::empty()).unwrap();
  let response = app.clone().oneshot(request).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], b"<main/>");

  let (status, _) = send(&app, "GET", "/extensions/nope/index", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
