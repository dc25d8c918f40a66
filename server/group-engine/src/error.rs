//! Structured error types for the group engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
  #[error("not found: {entity} {key}")]
  NotFound { entity: &'static str, key: String },

  #[error("summary trigger failed: {0}")]
  Trigger(String),

  #[error("malformed summary: {0}")]
  MalformedSummary(String),

  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl GroupError {
  pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
    Self::NotFound {
      entity,
      key: key.to_string(),
    }
  }

  pub fn group_not_found(id: i64) -> Self {
    Self::not_found("group", id)
  }

  pub fn cluster_not_found(cluster_key: &str) -> Self {
    Self::not_found("cluster", cluster_key)
  }

  pub fn trigger(msg: impl Into<String>) -> Self {
    Self::Trigger(msg.into())
  }

  pub fn malformed(msg: impl Into<String>) -> Self {
    Self::MalformedSummary(msg.into())
  }

  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::StoreUnavailable(msg.into())
  }

  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  /// Only store outages are worth retrying; everything else is final.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::StoreUnavailable(_))
  }
}

impl From<sqlx_core::Error> for GroupError {
  fn from(e: sqlx_core::Error) -> Self {
    Self::StoreUnavailable(e.to_string())
  }
}
