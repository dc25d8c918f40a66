//! In-memory GroupStore. One mutex guards all state, so every mutation is
//! serialized (a superset of per-key serialization).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::GroupStore;
use crate::error::GroupError;
use crate::types::*;

#[derive(Default)]
struct Inner {
  groups: HashMap<i64, ErrorGroup>,
  by_key: HashMap<String, i64>,
  events: Vec<ErrorEvent>,
  next_group_id: i64,
  next_event_id: i64,
}

impl Inner {
  fn group_by_key_mut(&mut self, cluster_key: &str) -> Option<&mut ErrorGroup> {
    let id = *self.by_key.get(cluster_key)?;
    self.groups.get_mut(&id)
  }
}

#[derive(Default)]
pub struct InMemoryGroupStore {
  inner: Mutex<Inner>,
}

impl InMemoryGroupStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Inner>, GroupError> {
    self
      .inner
      .lock()
      .map_err(|_| GroupError::unavailable("in-memory store lock poisoned"))
  }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
  async fn get(&self, id: i64) -> Result<ErrorGroup, GroupError> {
    let inner = self.lock()?;
    inner
      .groups
      .get(&id)
      .cloned()
      .ok_or_else(|| GroupError::group_not_found(id))
  }

  async fn get_by_cluster_key(&self, cluster_key: &str) -> Result<ErrorGroup, GroupError> {
    let inner = self.lock()?;
    inner
      .by_key
      .get(cluster_key)
      .and_then(|id| inner.groups.get(id))
      .cloned()
      .ok_or_else(|| GroupError::cluster_not_found(cluster_key))
  }

  async fn list_recent(&self, limit: i64) -> Result<Vec<ErrorGroup>, GroupError> {
    let inner = self.lock()?;
    let mut groups: Vec<ErrorGroup> = inner.groups.values().cloned().collect();
    // last_seen DESC NULLS LAST, then newest id first for determinism.
    groups.sort_by(|a, b| match (a.last_seen, b.last_seen) {
      (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
      (Some(_), None) => std::cmp::Ordering::Less,
      (None, Some(_)) => std::cmp::Ordering::Greater,
      (None, None) => b.id.cmp(&a.id),
    });
    groups.truncate(limit.max(0) as usize);
    Ok(groups)
  }

  async fn list_recent_events(&self, limit: i64) -> Result<Vec<ErrorEvent>, GroupError> {
    let inner = self.lock()?;
    let mut events = inner.events.clone();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    events.truncate(limit.max(0) as usize);
    Ok(events)
  }

  async fn resolve(&self, id: i64, reason: &str) -> Result<ErrorGroup, GroupError> {
    let mut inner = self.lock()?;
    let group = inner
      .groups
      .get_mut(&id)
      .ok_or_else(|| GroupError::group_not_found(id))?;

    if group.status != GroupStatus::Resolved {
      group.status = GroupStatus::Resolved;
      group.resolution_reason = Some(reason.to_string());
      group.resolved_at = Some(Utc::now());
    }
    debug_assert!(group.is_consistent());
    Ok(group.clone())
  }

  async fn apply_summary(
    &self,
    cluster_key: &str,
    summary: &AiSummary,
  ) -> Result<ErrorGroup, GroupError> {
    let mut inner = self.lock()?;
    let group = inner
      .group_by_key_mut(cluster_key)
      .ok_or_else(|| GroupError::cluster_not_found(cluster_key))?;

    group.ai_summary = Some(summary.clone());
    group.summarized_at = Some(Utc::now());
    Ok(group.clone())
  }

  async fn record_event(&self, event: &NewEvent) -> Result<Ingested, GroupError> {
    let mut inner = self.lock()?;

    inner.next_event_id += 1;
    let stored = ErrorEvent {
      id: inner.next_event_id,
      service: event.service.clone(),
      error_type: event.error_type.clone(),
      message: event.message.clone(),
      timestamp: event.timestamp,
      env: Some(event.env.clone()),
      path: Some(event.path.clone()),
      trace_id: Some(event.trace_id.clone()),
    };
    inner.events.push(stored.clone());

    if let Some(group) = inner.group_by_key_mut(&event.cluster_key) {
      group.count += 1;
      group.last_seen = Some(match group.last_seen {
        Some(prev) if prev > event.timestamp => prev,
        _ => event.timestamp,
      });
      if group.first_seen.is_none() {
        group.first_seen = Some(event.timestamp);
      }
      group.status = GroupStatus::Open;
      group.resolved_at = None;
      group.resolution_reason = None;
      debug_assert!(group.is_consistent());
      return Ok(Ingested {
        event: stored,
        group: group.clone(),
      });
    }

    inner.next_group_id += 1;
    let id = inner.next_group_id;
    let group = ErrorGroup {
      id,
      cluster_key: event.cluster_key.clone(),
      service: event.service.clone(),
      error_type: event.error_type.clone(),
      title: Some(format!("{} - {}", event.service, event.error_type)),
      status: GroupStatus::Open,
      count: 1,
      first_seen: Some(event.timestamp),
      last_seen: Some(event.timestamp),
      severity: None,
      ai_summary: None,
      summarized_at: None,
      resolution_reason: None,
      resolved_at: None,
    };
    inner.by_key.insert(event.cluster_key.clone(), id);
    inner.groups.insert(id, group.clone());
    Ok(Ingested {
      event: stored,
      group,
    })
  }

  async fn mark_quiet(&self, cutoff: DateTime<Utc>) -> Result<u64, GroupError> {
    let mut inner = self.lock()?;
    let mut moved = 0;
    for group in inner.groups.values_mut() {
      let stale = group.last_seen.is_some_and(|seen| seen < cutoff);
      if group.status == GroupStatus::Open && stale {
        group.status = GroupStatus::Quiet;
        moved += 1;
      }
    }
    Ok(moved)
  }
}
