//! Core types for the group engine (JSON contracts + stored records).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::summary;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what producers send)
// ---------------------------------------------------------------------------

/// One error report from a producer. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundError {
  pub service: String,
  pub error_type: String,
  pub message: String,
  #[serde(default)]
  pub env: Option<String>,
  #[serde(default)]
  pub path: Option<String>,
}

/// Validated event, stamped and keyed, ready to be recorded.
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub cluster_key: String,
  pub service: String,
  pub error_type: String,
  pub message: String,
  pub env: String,
  pub path: String,
  pub trace_id: String,
  pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status (persisted as upper-case text)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
  Open,
  Quiet,
  Resolved,
  /// Display fallback for missing or unrecognised values. Never written.
  #[serde(other)]
  Unknown,
}

impl GroupStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "OPEN",
      Self::Quiet => "QUIET",
      Self::Resolved => "RESOLVED",
      Self::Unknown => "UNKNOWN",
    }
  }

  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_uppercase().as_str() {
      "OPEN" => Self::Open,
      "QUIET" => Self::Quiet,
      "RESOLVED" => Self::Resolved,
      _ => Self::Unknown,
    }
  }
}

// ---------------------------------------------------------------------------
// Summary payload
// ---------------------------------------------------------------------------

/// Structured result written back by the summarization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSummary {
  pub severity: String,
  pub summary: String,
  #[serde(default)]
  pub next_steps: Vec<String>,
}

impl AiSummary {
  /// A summary counts only when it carries actual text.
  pub fn is_present(&self) -> bool {
    !self.summary.trim().is_empty()
  }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// Immutable ingested fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
  pub id: i64,
  pub service: String,
  pub error_type: String,
  pub message: String,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub env: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trace_id: Option<String>,
}

/// Aggregate for every event sharing one cluster key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorGroup {
  pub id: i64,
  pub cluster_key: String,
  pub service: String,
  pub error_type: String,
  #[serde(default)]
  pub title: Option<String>,
  pub status: GroupStatus,
  pub count: i64,
  pub first_seen: Option<DateTime<Utc>>,
  pub last_seen: Option<DateTime<Utc>>,
  #[serde(default)]
  pub severity: Option<String>,
  #[serde(default, deserialize_with = "summary::deserialize_lenient")]
  pub ai_summary: Option<AiSummary>,
  #[serde(default)]
  pub summarized_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub resolution_reason: Option<String>,
  #[serde(default)]
  pub resolved_at: Option<DateTime<Utc>>,
}

impl ErrorGroup {
  pub fn has_summary(&self) -> bool {
    self.ai_summary.as_ref().is_some_and(AiSummary::is_present)
  }

  /// Summary severity wins over the ingest heuristic.
  pub fn effective_severity(&self) -> &str {
    self
      .ai_summary
      .as_ref()
      .map(|s| s.severity.as_str())
      .filter(|s| !s.is_empty())
      .or(self.severity.as_deref())
      .unwrap_or("unknown")
  }

  /// `resolved_at` set iff RESOLVED, and `last_seen >= first_seen`.
  pub fn is_consistent(&self) -> bool {
    let resolution_ok = self.resolved_at.is_some() == (self.status == GroupStatus::Resolved);
    let window_ok = match (self.first_seen, self.last_seen) {
      (Some(first), Some(last)) => last >= first,
      _ => true,
    };
    resolution_ok && window_ok
  }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Dashboard snapshot: latest events plus groups by recency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupsSnapshot {
  pub errors: Vec<ErrorEvent>,
  pub groups: Vec<ErrorGroup>,
}

/// Result of recording one inbound error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingested {
  pub event: ErrorEvent,
  pub group: ErrorGroup,
}
