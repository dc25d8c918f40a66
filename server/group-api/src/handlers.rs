//! HTTP handlers for the group API.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use group_engine::{store, summary, ErrorGroup, GroupError, GroupsSnapshot, InboundError, Ingested};

use crate::state::AppState;
use crate::types::{
  ErrorOutput, IngestQuery, IngestResponse, ListQuery, SummarizeQuery, SummarizeResponse,
  SummarizeState,
};

/// Engine errors mapped onto status codes.
pub struct ApiError(GroupError);

impl From<GroupError> for ApiError {
  fn from(e: GroupError) -> Self {
    Self(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self.0 {
      GroupError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorOutput::new(self.0.to_string())),
      GroupError::Validation { field, reason } => (
        StatusCode::BAD_REQUEST,
        ErrorOutput::new(reason.clone()).with_field(field.clone()),
      ),
      GroupError::MalformedSummary(_) | GroupError::Json(_) => {
        (StatusCode::BAD_REQUEST, ErrorOutput::new(self.0.to_string()))
      }
      GroupError::Trigger(_) => (StatusCode::BAD_GATEWAY, ErrorOutput::new(self.0.to_string())),
      GroupError::StoreUnavailable(_) => {
        tracing::error!(error = %self.0, "store unavailable");
        (
          StatusCode::SERVICE_UNAVAILABLE,
          ErrorOutput::new(self.0.to_string()),
        )
      }
    };
    (status, Json(body)).into_response()
  }
}

pub async fn health() -> &'static str {
  "ok"
}

pub async fn list_groups(
  State(state): State<Arc<AppState>>,
  Query(query): Query<ListQuery>,
) -> Result<Json<GroupsSnapshot>, ApiError> {
  let limit = query.limit.unwrap_or(state.config.list_limit);
  if limit < 0 {
    return Err(GroupError::validation("limit", "must not be negative").into());
  }
  let snapshot = store::snapshot(
    state.store.as_ref(),
    limit,
    state.config.read_retries,
    state.config.retry_backoff,
  )
  .await?;
  Ok(Json(snapshot))
}

pub async fn resolve_group(
  State(state): State<Arc<AppState>>,
  Path(group): Path<String>,
) -> Result<Json<ErrorGroup>, ApiError> {
  let id: i64 = group
    .parse()
    .map_err(|_| GroupError::validation("id", "must be an integer group id"))?;
  let resolved = state.controller.resolve(id).await?;
  Ok(Json(resolved))
}

/// 202 once the trigger is accepted; the wait continues in the background.
/// With `?wait=true` the wait runs inline: 200 on a fresh summary, 202 with
/// the last observed group otherwise.
pub async fn summarize_group(
  State(state): State<Arc<AppState>>,
  Path(cluster_key): Path<String>,
  Query(query): Query<SummarizeQuery>,
) -> Result<(StatusCode, Json<SummarizeResponse>), ApiError> {
  if !query.wait {
    let ticket = state.controller.request_summary(&cluster_key).await?;
    return Ok((
      StatusCode::ACCEPTED,
      Json(SummarizeResponse {
        status: SummarizeState::Accepted,
        cluster_key: ticket.cluster_key,
        group: None,
      }),
    ));
  }

  // Dropping this future (client gone) abandons the wait as well.
  let cancel = state.shutdown.child_token();
  let outcome = state
    .controller
    .request_summary_and_wait(&cluster_key, &cancel)
    .await?;
  let code = if outcome.is_complete() {
    StatusCode::OK
  } else {
    StatusCode::ACCEPTED
  };
  Ok((
    code,
    Json(SummarizeResponse {
      status: outcome.status.into(),
      cluster_key,
      group: Some(outcome.group),
    }),
  ))
}

/// Write-back from the summary engine. The body must decode strictly.
pub async fn apply_summary(
  State(state): State<Arc<AppState>>,
  Path(cluster_key): Path<String>,
  body: String,
) -> Result<Json<ErrorGroup>, ApiError> {
  let parsed = summary::decode(&body)?;
  if !parsed.is_present() {
    return Err(GroupError::validation("summary", "must not be empty").into());
  }
  let group = state.store.apply_summary(&cluster_key, &parsed).await?;
  tracing::info!(cluster_key = %group.cluster_key, "summary stored");
  Ok(Json(group))
}

pub async fn ingest(
  State(state): State<Arc<AppState>>,
  Query(query): Query<IngestQuery>,
  Json(payload): Json<InboundError>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
  let ingested = state.aggregator.record(&payload).await?;
  Ok(created(&state, ingested, query.trigger).await)
}

/// Record one canned sample error; handy for demos.
pub async fn ingest_random(
  State(state): State<Arc<AppState>>,
  Query(query): Query<IngestQuery>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
  let ingested = state.aggregator.record_sample().await?;
  Ok(created(&state, ingested, query.trigger).await)
}

/// The event is stored either way; a failed trigger only shows up in the body.
async fn created(
  state: &AppState,
  ingested: Ingested,
  trigger: bool,
) -> (StatusCode, Json<IngestResponse>) {
  let summary_triggered = if trigger {
    let fired = state
      .controller
      .trigger_summary(&ingested.group.cluster_key)
      .await;
    Some(fired.is_ok())
  } else {
    None
  };
  (
    StatusCode::CREATED,
    Json(IngestResponse {
      ingested,
      summary_triggered,
    }),
  )
}
