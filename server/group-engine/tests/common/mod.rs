//! Shared fixtures: a scripted summary engine and a flaky store wrapper.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use group_engine::store::GroupStore;
use group_engine::types::NewEvent;
use group_engine::*;

pub fn inbound(service: &str, error_type: &str) -> InboundError {
  InboundError {
    service: service.into(),
    error_type: error_type.into(),
    message: format!("{} failed", error_type),
    env: None,
    path: None,
  }
}

pub fn summary(severity: &str, text: &str) -> AiSummary {
  AiSummary {
    severity: severity.into(),
    summary: text.into(),
    next_steps: vec!["check the recent deploy".into()],
  }
}

/// What the scripted engine does when triggered.
#[derive(Clone)]
pub enum Script {
  /// Write `AiSummary` to the store after the delay.
  WriteAfter(Duration, AiSummary),
  /// Accept the trigger and never write anything.
  Silent,
  /// Reject the trigger.
  Reject,
}

pub struct ScriptedEngine {
  store: Arc<dyn GroupStore>,
  script: Script,
  pub triggers: AtomicU32,
}

impl ScriptedEngine {
  pub fn new(store: Arc<dyn GroupStore>, script: Script) -> Self {
    Self {
      store,
      script,
      triggers: AtomicU32::new(0),
    }
  }

  pub fn trigger_count(&self) -> u32 {
    self.triggers.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl SummaryEngine for ScriptedEngine {
  async fn trigger(&self, cluster_key: &str) -> Result<(), GroupError> {
    self.triggers.fetch_add(1, Ordering::SeqCst);
    match &self.script {
      Script::WriteAfter(delay, result) => {
        let store = Arc::clone(&self.store);
        let key = cluster_key.to_string();
        let delay = *delay;
        let result = result.clone();
        tokio::spawn(async move {
          tokio::time::sleep(delay).await;
          let _ = store.apply_summary(&key, &result).await;
        });
        Ok(())
      }
      Script::Silent => Ok(()),
      Script::Reject => Err(GroupError::trigger("engine returned 503")),
    }
  }
}

/// Fails the next `failures` cluster-key reads with `StoreUnavailable`.
pub struct FlakyStore {
  inner: Arc<dyn GroupStore>,
  failures: AtomicU32,
}

impl FlakyStore {
  pub fn new(inner: Arc<dyn GroupStore>) -> Self {
    Self {
      inner,
      failures: AtomicU32::new(0),
    }
  }

  pub fn fail_next(&self, n: u32) {
    self.failures.store(n, Ordering::SeqCst);
  }
}

#[async_trait]
impl GroupStore for FlakyStore {
  async fn get(&self, id: i64) -> Result<ErrorGroup, GroupError> {
    self.inner.get(id).await
  }

  async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<ErrorGroup, GroupError> {
    let left = self.failures.load(Ordering::SeqCst);
    if left > 0 {
      self.failures.store(left - 1, Ordering::SeqCst);
      return Err(GroupError::unavailable("connection reset by peer"));
    }
    self.inner.get_by_cluster_key(cluster_key).await
  }

  async fn list_recent(&self, limit: i64) -> Result<Vec<ErrorGroup>, GroupError> {
    self.inner.list_recent(limit).await
  }

  async fn list_recent_events(&self, limit: i64) -> Result<Vec<ErrorEvent>, GroupError> {
    self.inner.list_recent_events(limit).await
  }

  async fn resolve(&self, id: i64, reason: &str) -> Result<ErrorGroup, GroupError> {
    self.inner.resolve(id, reason).await
  }

  async fn apply_summary(
    &self,
    cluster_key: &str,
    summary: &AiSummary,
  ) -> Result<ErrorGroup, GroupError> {
    self.inner.apply_summary(cluster_key, summary).await
  }

  async fn record_event(&self, event: &NewEvent) -> Result<Ingested, GroupError> {
    self.inner.record_event(event).await
  }

  async fn mark_quiet(&self, cutoff: DateTime<Utc>) -> Result<u64, GroupError> {
    self.inner.mark_quiet(cutoff).await
  }
}

pub fn fast_config() -> Config {
  Config {
    poll_interval: Duration::from_secs(2),
    max_wait: Duration::from_secs(30),
    ..Config::default()
  }
}
