//! Validate inbound error reports into canonical `NewEvent`s.

use chrono::{DateTime, Utc};

use crate::cluster_key;
use crate::error::GroupError;
use crate::types::{InboundError, NewEvent};

const DEFAULT_ENV: &str = "prod";

/// Validate an inbound report and stamp it with `now` and a fresh trace id.
pub fn normalize(raw: &InboundError, now: DateTime<Utc>) -> Result<NewEvent, GroupError> {
  let service = raw.service.trim();
  let error_type = raw.error_type.trim();

  if service.is_empty() {
    return Err(GroupError::validation("service", "must not be empty"));
  }
  if error_type.is_empty() {
    return Err(GroupError::validation("error_type", "must not be empty"));
  }
  if raw.message.trim().is_empty() {
    return Err(GroupError::validation("message", "must not be empty"));
  }

  let env = raw
    .env
    .as_deref()
    .map(str::trim)
    .filter(|e| !e.is_empty())
    .unwrap_or(DEFAULT_ENV)
    .to_ascii_lowercase();

  Ok(NewEvent {
    cluster_key: cluster_key::compute(service, error_type),
    service: service.to_string(),
    error_type: error_type.to_string(),
    message: raw.message.clone(),
    env,
    path: raw.path.clone().unwrap_or_default(),
    trace_id: trace_id(),
    timestamp: now,
  })
}

/// 16 hex characters, enough to correlate log lines.
fn trace_id() -> String {
  uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}
