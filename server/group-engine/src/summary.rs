//! Decoding of the `ai_summary` blob.
//!
//! The summary engine stores its result as serialized JSON text, sometimes
//! double-encoded. Reads must never fail because of it: anything that does not
//! decode into an `AiSummary` is logged and treated as "no summary".

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::GroupError;
use crate::types::AiSummary;

/// Strict decode of stored summary text.
pub fn decode(raw: &str) -> Result<AiSummary, GroupError> {
  let value: Value =
    serde_json::from_str(raw).map_err(|e| GroupError::malformed(format!("not json: {}", e)))?;
  decode_value(value)
}

/// Strict decode of an already-parsed value (object, or a string holding one).
pub fn decode_value(value: Value) -> Result<AiSummary, GroupError> {
  match value {
    Value::Object(_) => serde_json::from_value(value)
      .map_err(|e| GroupError::malformed(format!("unexpected shape: {}", e))),
    Value::String(inner) => {
      let nested: Value = serde_json::from_str(&inner)
        .map_err(|e| GroupError::malformed(format!("not json: {}", e)))?;
      match nested {
        Value::Object(_) => serde_json::from_value(nested)
          .map_err(|e| GroupError::malformed(format!("unexpected shape: {}", e))),
        other => Err(GroupError::malformed(format!(
          "expected object, got {}",
          kind(&other)
        ))),
      }
    }
    other => Err(GroupError::malformed(format!(
      "expected object, got {}",
      kind(&other)
    ))),
  }
}

/// Read-path decode: missing, blank, or malformed text all become `None`.
pub fn decode_lenient(raw: Option<&str>) -> Option<AiSummary> {
  let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
  match decode(raw) {
    Ok(summary) => Some(summary),
    Err(e) => {
      tracing::warn!(error = %e, "ignoring unreadable ai_summary");
      None
    }
  }
}

/// Text form persisted in the `ai_summary` column.
pub fn encode(summary: &AiSummary) -> Result<String, GroupError> {
  Ok(serde_json::to_string(summary)?)
}

/// `deserialize_with` hook so JSON readers degrade the same way the store does.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<AiSummary>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    None | Some(Value::Null) => None,
    Some(v) => match decode_value(v) {
      Ok(summary) => Some(summary),
      Err(e) => {
        tracing::warn!(error = %e, "ignoring unreadable ai_summary");
        None
      }
    },
  })
}

fn kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
