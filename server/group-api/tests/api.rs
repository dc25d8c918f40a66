//! Router tests over the in-memory store and a scripted summary engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use group_api::{router, AppState};
use group_engine::{
  AiSummary, Config, GroupError, GroupStore, InMemoryGroupStore, SummaryEngine, SAMPLE_ERRORS,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

enum Script {
  WriteAfter(Duration),
  Reject,
}

struct ScriptedEngine {
  store: Arc<dyn GroupStore>,
  script: Script,
}

#[async_trait]
impl SummaryEngine for ScriptedEngine {
  async fn trigger(&self, cluster_key: &str) -> Result<(), GroupError> {
    match self.script {
      Script::WriteAfter(delay) => {
        let store = Arc::clone(&self.store);
        let key = cluster_key.to_string();
        tokio::spawn(async move {
          tokio::time::sleep(delay).await;
          let result = AiSummary {
            severity: "high".into(),
            summary: "Null user record dereferenced in UserController".into(),
            next_steps: vec!["add a null guard".into()],
          };
          let _ = store.apply_summary(&key, &result).await;
        });
        Ok(())
      }
      Script::Reject => Err(GroupError::trigger("engine returned 503")),
    }
  }
}

fn app(script: Script) -> Router {
  let store: Arc<dyn GroupStore> = Arc::new(InMemoryGroupStore::new());
  let engine = Arc::new(ScriptedEngine {
    store: Arc::clone(&store),
    script,
  });
  let state = AppState::new(store, engine, Config::default(), CancellationToken::new());
  router(Arc::new(state))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let request = match body {
    Some(v) => builder
      .header("content-type", "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let resp = app.clone().oneshot(request).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

async fn ingest(app: &Router, service: &str, error_type: &str) -> Value {
  let (status, body) = call(
    app,
    Method::POST,
    "/errors",
    Some(json!({
      "service": service,
      "error_type": error_type,
      "message": "Cannot read property 'x' of null",
      "path": "/v1/users/123"
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  body
}

const KEY_PATH: &str = "svc-a%3ANullPointerException";

#[tokio::test]
async fn health_is_ok() {
  let app = app(Script::Reject);
  let resp = app
    .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_then_list() {
  let app = app(Script::Reject);
  let first = ingest(&app, "user-api", "NullPointer").await;
  assert_eq!(first["group"]["count"], 1);
  assert_eq!(first["group"]["status"], "OPEN");
  let second = ingest(&app, "user-api", "NullPointer").await;
  assert_eq!(second["group"]["count"], 2);
  ingest(&app, "payment-api", "Timeout").await;

  let (status, body) = call(&app, Method::GET, "/groups", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["errors"].as_array().unwrap().len(), 3);
  let groups = body["groups"].as_array().unwrap();
  assert_eq!(groups.len(), 2);
  assert_eq!(groups[0]["cluster_key"], "payment-api:Timeout");

  let (_, limited) = call(&app, Method::GET, "/groups?limit=1", None).await;
  assert_eq!(limited["groups"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn random_error_records_a_catalog_sample() {
  let app = app(Script::Reject);
  let (status, body) = call(&app, Method::POST, "/errors/random", None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(body.get("summary_triggered").is_none());

  let service = body["event"]["service"].as_str().unwrap();
  let error_type = body["event"]["error_type"].as_str().unwrap();
  assert!(SAMPLE_ERRORS
    .iter()
    .any(|s| s.service == service && s.error_type == error_type));
  assert_eq!(body["event"]["env"], "prod");
  assert_eq!(body["group"]["cluster_key"], format!("{}:{}", service, error_type));
}

#[tokio::test(start_paused = true)]
async fn ingest_with_trigger_fires_the_engine() {
  let app = app(Script::WriteAfter(Duration::from_secs(2)));
  let (status, body) = call(
    &app,
    Method::POST,
    "/errors?trigger=true",
    Some(json!({"service": "svc-a", "error_type": "NullPointerException", "message": "boom"})),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["summary_triggered"], true);
  assert_eq!(body["group"]["count"], 1);

  tokio::time::sleep(Duration::from_secs(3)).await;
  let (_, after) = call(&app, Method::GET, "/groups", None).await;
  assert_eq!(after["groups"][0]["ai_summary"]["severity"], "high");
}

#[tokio::test]
async fn rejected_trigger_still_records_the_event() {
  let app = app(Script::Reject);
  let (status, body) = call(&app, Method::POST, "/errors/random?trigger=true", None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["summary_triggered"], false);

  let (_, listed) = call(&app, Method::GET, "/groups", None).await;
  assert_eq!(listed["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn negative_limit_is_rejected() {
  let app = app(Script::Reject);
  let (status, body) = call(&app, Method::GET, "/groups?limit=-5", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["field"], "limit");
}

#[tokio::test]
async fn invalid_ingest_names_the_field() {
  let app = app(Script::Reject);
  let (status, body) = call(
    &app,
    Method::POST,
    "/errors",
    Some(json!({"service": "", "error_type": "Timeout", "message": "x"})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], true);
  assert_eq!(body["field"], "service");
}

#[tokio::test]
async fn resolve_is_idempotent_over_http() {
  let app = app(Script::Reject);
  let created = ingest(&app, "order-api", "DBError").await;
  let id = created["group"]["id"].as_i64().unwrap();
  let uri = format!("/groups/{}/resolve", id);

  let (status, once) = call(&app, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(once["status"], "RESOLVED");
  assert_eq!(once["resolution_reason"], "manual");
  assert!(!once["resolved_at"].is_null());
  assert_eq!(once["count"], 1);

  let (status, twice) = call(&app, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(once, twice);
}

#[tokio::test]
async fn resolve_errors_map_to_status_codes() {
  let app = app(Script::Reject);
  let (status, _) = call(&app, Method::POST, "/groups/99/resolve", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = call(&app, Method::POST, "/groups/abc/resolve", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["field"], "id");
}

#[tokio::test(start_paused = true)]
async fn summarize_is_accepted_and_lands_later() {
  let app = app(Script::WriteAfter(Duration::from_secs(4)));
  ingest(&app, "svc-a", "NullPointerException").await;

  let uri = format!("/groups/{}/summarize", KEY_PATH);
  let (status, body) = call(&app, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert_eq!(body["status"], "accepted");
  assert_eq!(body["cluster_key"], "svc-a:NullPointerException");

  let (_, before) = call(&app, Method::GET, "/groups", None).await;
  assert!(before["groups"][0]["ai_summary"].is_null());

  tokio::time::sleep(Duration::from_secs(5)).await;
  let (_, after) = call(&app, Method::GET, "/groups", None).await;
  assert_eq!(after["groups"][0]["ai_summary"]["severity"], "high");
  assert_eq!(after["groups"][0]["count"], 1);
}

#[tokio::test(start_paused = true)]
async fn summarize_with_wait_returns_the_group() {
  let app = app(Script::WriteAfter(Duration::from_secs(3)));
  ingest(&app, "svc-a", "NullPointerException").await;

  let uri = format!("/groups/{}/summarize?wait=true", KEY_PATH);
  let (status, body) = call(&app, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "completed");
  assert_eq!(
    body["group"]["ai_summary"]["next_steps"][0],
    "add a null guard"
  );
}

#[tokio::test]
async fn summarize_failures_surface() {
  let app = app(Script::Reject);
  let (status, _) = call(&app, Method::POST, "/groups/nope%3ANope/summarize", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  ingest(&app, "svc-a", "NullPointerException").await;
  let uri = format!("/groups/{}/summarize", KEY_PATH);
  let (status, body) = call(&app, Method::POST, &uri, None).await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert_eq!(body["error"], true);
}

#[tokio::test]
async fn summary_write_back_validates_payload() {
  let app = app(Script::Reject);
  ingest(&app, "svc-a", "NullPointerException").await;
  let uri = format!("/groups/{}/summary", KEY_PATH);

  let (status, _) = call(&app, Method::POST, &uri, Some(json!(["not", "a", "summary"]))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = call(
    &app,
    Method::POST,
    &uri,
    Some(json!({"severity": "medium", "summary": "retry storm", "next_steps": ["cap retries"]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ai_summary"]["summary"], "retry storm");

  let (status, _) = call(
    &app,
    Method::POST,
    "/groups/ghost%3AX/summary",
    Some(json!({"severity": "low", "summary": "x"})),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
