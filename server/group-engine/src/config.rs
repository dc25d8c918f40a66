//! Engine configuration with sane defaults.

use std::time::Duration;

/// Lifecycle and polling knobs.
#[derive(Debug, Clone)]
pub struct Config {
  /// Cadence of store reads while waiting for a summary.
  pub poll_interval: Duration,
  /// Wall-clock ceiling for one summary wait (soft timeout).
  pub max_wait: Duration,
  /// Extra attempts for a read that hits `StoreUnavailable`.
  pub read_retries: u32,
  /// Pause between read retries.
  pub retry_backoff: Duration,
  /// Silence after which an OPEN group is demoted to QUIET.
  pub quiescence_window: chrono::Duration,
  /// Default snapshot size for listings.
  pub list_limit: i64,
  /// Reason recorded by a plain `resolve`.
  pub resolution_reason: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(2),
      max_wait: Duration::from_secs(30),
      read_retries: 3,
      retry_backoff: Duration::from_millis(200),
      quiescence_window: chrono::Duration::minutes(60),
      list_limit: 50,
      resolution_reason: "manual".to_string(),
    }
  }
}

/// Where and how to reach the external summarization engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Base URL; the trigger goes to `{base_url}/groups/{cluster_key}/summarize`.
  pub base_url: String,
  pub username: Option<String>,
  pub password: Option<String>,
  pub request_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8009".to_string(),
      username: None,
      password: None,
      request_timeout: Duration::from_secs(15),
    }
  }
}
