//! GroupStore: the single source of truth for `ErrorGroup` state.
//!
//! Every mutation path (ingest upsert, resolve, summary write-back, quiet
//! sweep) goes through this trait. Implementations serialize mutations per
//! cluster key and apply each call all-or-nothing.

mod memory;
mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GroupError;
use crate::types::{AiSummary, ErrorEvent, ErrorGroup, GroupsSnapshot, Ingested, NewEvent};

pub use memory::InMemoryGroupStore;
pub use postgres::PgGroupStore;

#[async_trait]
pub trait GroupStore: Send + Sync {
  async fn get(&self, id: i64) -> Result<ErrorGroup, GroupError>;

  async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<ErrorGroup, GroupError>;

  /// Groups by `last_seen` descending, nulls last. A one-shot snapshot.
  async fn list_recent(&self, limit: i64) -> Result<Vec<ErrorGroup>, GroupError>;

  /// Latest ingested events, newest first.
  async fn list_recent_events(&self, limit: i64) -> Result<Vec<ErrorEvent>, GroupError>;

  /// OPEN|QUIET -> RESOLVED. Already resolved groups come back untouched.
  async fn resolve(&self, id: i64, reason: &str) -> Result<ErrorGroup, GroupError>;

  /// Overwrite `ai_summary` (last writer wins) and stamp `summarized_at`.
  async fn apply_summary(
    &self,
    cluster_key: &str,
    summary: &AiSummary,
  ) -> Result<ErrorGroup, GroupError>;

  /// Append the event and upsert its group; reopens QUIET/RESOLVED groups.
  async fn record_event(&self, event: &NewEvent) -> Result<Ingested, GroupError>;

  /// Demote OPEN groups last seen before `cutoff` to QUIET.
  async fn mark_quiet(&self, cutoff: DateTime<Utc>) -> Result<u64, GroupError>;
}

/// Run a read, retrying `StoreUnavailable` up to `retries` extra times.
pub async fn with_read_retry<T, F, Fut>(
  retries: u32,
  backoff: Duration,
  mut read: F,
) -> Result<T, GroupError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, GroupError>>,
{
  let mut attempt = 0;
  loop {
    match read().await {
      Err(e) if e.is_transient() && attempt < retries => {
        attempt += 1;
        tracing::warn!(attempt, error = %e, "store read failed, retrying");
        tokio::time::sleep(backoff).await;
      }
      other => return other,
    }
  }
}

/// Dashboard snapshot: both listings, each read with retry.
pub async fn snapshot<S: GroupStore + ?Sized>(
  store: &S,
  limit: i64,
  retries: u32,
  backoff: Duration,
) -> Result<GroupsSnapshot, GroupError> {
  let errors = with_read_retry(retries, backoff, move || store.list_recent_events(limit)).await?;
  let groups = with_read_retry(retries, backoff, move || store.list_recent(limit)).await?;
  Ok(GroupsSnapshot { errors, groups })
}
