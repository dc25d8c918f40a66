//! Request/response types for the group API.

use group_engine::{ErrorGroup, Ingested, WaitStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummarizeQuery {
  /// Wait inline for the result instead of returning 202 straight away.
  #[serde(default)]
  pub wait: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
  /// Fire the summary engine once the event is recorded.
  #[serde(default)]
  pub trigger: bool,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  #[serde(flatten)]
  pub ingested: Ingested,
  /// Present only when `?trigger=true` was asked for.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub summary_triggered: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizeState {
  Accepted,
  Completed,
  TimedOut,
  Cancelled,
}

impl From<WaitStatus> for SummarizeState {
  fn from(status: WaitStatus) -> Self {
    match status {
      WaitStatus::Completed => Self::Completed,
      WaitStatus::TimedOut => Self::TimedOut,
      WaitStatus::Cancelled => Self::Cancelled,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
  pub status: SummarizeState,
  pub cluster_key: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub group: Option<ErrorGroup>,
}

/// Structured error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
