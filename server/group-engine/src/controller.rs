//! ResolutionController: the idempotent operations the dashboard calls.
//!
//! At most one background observer runs per cluster key. A new request for a
//! key that is already being watched cancels the older observer and starts a
//! fresh one with the new baseline and deadline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GroupError;
use crate::orchestrator::{SummarizationOrchestrator, SummaryOutcome, WaitOptions};
use crate::store::GroupStore;
use crate::types::ErrorGroup;

/// Handle to a summary wait running in the background.
#[derive(Debug)]
pub struct SummaryTicket {
  pub cluster_key: String,
  pub handle: JoinHandle<Result<SummaryOutcome, GroupError>>,
}

pub struct ResolutionController {
  store: Arc<dyn GroupStore>,
  orchestrator: Arc<SummarizationOrchestrator>,
  /// Parent of every background wait; cancel it on shutdown.
  shutdown: CancellationToken,
  observers: Arc<Mutex<Observers>>,
}

/// Live background observers by cluster key.
#[derive(Default)]
struct Observers {
  next_generation: u64,
  by_key: HashMap<String, (u64, CancellationToken)>,
}

fn lock_observers(observers: &Mutex<Observers>) -> MutexGuard<'_, Observers> {
  // The map only holds tokens; a panic mid-update cannot leave it inconsistent.
  observers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResolutionController {
  pub fn new(
    store: Arc<dyn GroupStore>,
    orchestrator: Arc<SummarizationOrchestrator>,
    shutdown: CancellationToken,
  ) -> Self {
    Self {
      store,
      orchestrator,
      shutdown,
      observers: Arc::default(),
    }
  }

  /// Number of background observers still running.
  pub fn active_observers(&self) -> usize {
    lock_observers(&self.observers).by_key.len()
  }

  /// Resolve with the configured default reason.
  pub async fn resolve(&self, group_id: i64) -> Result<ErrorGroup, GroupError> {
    let reason = self.orchestrator.config().resolution_reason.clone();
    self.resolve_with_reason(group_id, &reason).await
  }

  /// Repeat calls return the same resolved group; the first reason sticks.
  pub async fn resolve_with_reason(
    &self,
    group_id: i64,
    reason: &str,
  ) -> Result<ErrorGroup, GroupError> {
    let group = self.store.resolve(group_id, reason).await?;
    info!(
      group_id,
      cluster_key = %group.cluster_key,
      status = group.status.as_str(),
      reason = group.resolution_reason.as_deref().unwrap_or(reason),
      "resolve applied"
    );
    Ok(group)
  }

  /// Trigger summarization and observe it in the background. Trigger
  /// failures and unknown keys are reported here; the wait itself is not.
  /// An observer already watching this key is cancelled and replaced.
  pub async fn request_summary(&self, cluster_key: &str) -> Result<SummaryTicket, GroupError> {
    let options = WaitOptions::from(self.orchestrator.config());
    let wait = self.orchestrator.begin(cluster_key, options).await?;

    let cancel = self.shutdown.child_token();
    let generation = {
      let mut observers = lock_observers(&self.observers);
      observers.next_generation += 1;
      let generation = observers.next_generation;
      if let Some((_, previous)) = observers
        .by_key
        .insert(cluster_key.to_string(), (generation, cancel.clone()))
      {
        debug!(cluster_key, "replacing running summary observer");
        previous.cancel();
      }
      generation
    };

    let orchestrator = Arc::clone(&self.orchestrator);
    let observers = Arc::clone(&self.observers);
    let key = cluster_key.to_string();
    let handle = tokio::spawn(async move {
      let outcome = orchestrator.observe(wait, &cancel).await;
      {
        let mut live = lock_observers(&observers);
        if live.by_key.get(&key).is_some_and(|(g, _)| *g == generation) {
          live.by_key.remove(&key);
        }
      }
      if let Err(e) = &outcome {
        warn!(cluster_key = %key, error = %e, "background summary wait failed");
      }
      outcome
    });

    Ok(SummaryTicket {
      cluster_key: cluster_key.to_string(),
      handle,
    })
  }

  /// Fire-and-forget trigger, used right after ingest where the group is
  /// known to exist and nobody waits on the result.
  pub async fn trigger_summary(&self, cluster_key: &str) -> Result<(), GroupError> {
    self.orchestrator.trigger(cluster_key).await
  }

  /// Trigger and wait inline; `cancel` lets the caller walk away early.
  pub async fn request_summary_and_wait(
    &self,
    cluster_key: &str,
    cancel: &CancellationToken,
  ) -> Result<SummaryOutcome, GroupError> {
    self
      .orchestrator
      .request_summary_and_wait(cluster_key, cancel)
      .await
  }
}
