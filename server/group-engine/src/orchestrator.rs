//! Summarization orchestration: trigger the external engine, then observe the
//! store at a fixed cadence until a fresh summary lands or the deadline passes.
//!
//! The wait is an explicit `SummaryWait` value rather than a loop buried in a
//! caller, so it can run inline or on its own task. Cancellation is a token
//! checked around every sleep and read; abandoning a wait never touches the
//! store or the engine job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GroupError;
use crate::store::{with_read_retry, GroupStore};
use crate::trigger::SummaryEngine;
use crate::types::{AiSummary, ErrorGroup};

/// Polling cadence and ceiling for one wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
  pub poll_interval: Duration,
  pub max_wait: Duration,
}

impl From<&Config> for WaitOptions {
  fn from(config: &Config) -> Self {
    Self {
      poll_interval: config.poll_interval,
      max_wait: config.max_wait,
    }
  }
}

/// State of an in-flight wait for one cluster key.
#[derive(Debug, Clone)]
pub struct SummaryWait {
  pub cluster_key: String,
  pub started_at: Instant,
  pub deadline: Instant,
  pub poll_interval: Duration,
  /// Group as read just before the trigger.
  baseline: ErrorGroup,
}

impl SummaryWait {
  pub fn new(baseline: ErrorGroup, options: WaitOptions) -> Self {
    let started_at = Instant::now();
    Self {
      cluster_key: baseline.cluster_key.clone(),
      started_at,
      deadline: started_at + options.max_wait,
      poll_interval: options.poll_interval,
      baseline,
    }
  }

  pub fn baseline(&self) -> &ErrorGroup {
    &self.baseline
  }

  pub fn remaining(&self) -> Duration {
    self.deadline.saturating_duration_since(Instant::now())
  }

  pub fn elapsed(&self) -> Duration {
    self.started_at.elapsed()
  }

  /// A summary written after the trigger; a pre-existing one does not count.
  pub fn is_fresh(&self, group: &ErrorGroup) -> bool {
    group.has_summary() && stamp(group) != stamp(&self.baseline)
  }
}

fn stamp(group: &ErrorGroup) -> (Option<DateTime<Utc>>, Option<&AiSummary>) {
  (group.summarized_at, group.ai_summary.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
  /// A fresh summary was observed.
  Completed,
  /// Deadline reached; the group is returned as last seen.
  TimedOut,
  /// The caller gave up first.
  Cancelled,
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
  pub group: ErrorGroup,
  pub status: WaitStatus,
  pub polls: u32,
  pub elapsed: Duration,
}

impl SummaryOutcome {
  pub fn is_complete(&self) -> bool {
    self.status == WaitStatus::Completed
  }
}

pub struct SummarizationOrchestrator {
  store: Arc<dyn GroupStore>,
  engine: Arc<dyn SummaryEngine>,
  config: Config,
}

impl SummarizationOrchestrator {
  pub fn new(store: Arc<dyn GroupStore>, engine: Arc<dyn SummaryEngine>, config: Config) -> Self {
    Self {
      store,
      engine,
      config,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Trigger with the configured cadence and wait for the result.
  pub async fn request_summary_and_wait(
    &self,
    cluster_key: &str,
    cancel: &CancellationToken,
  ) -> Result<SummaryOutcome, GroupError> {
    self
      .request_summary_and_wait_with(cluster_key, WaitOptions::from(&self.config), cancel)
      .await
  }

  pub async fn request_summary_and_wait_with(
    &self,
    cluster_key: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
  ) -> Result<SummaryOutcome, GroupError> {
    let wait = self.begin(cluster_key, options).await?;
    self.observe(wait, cancel).await
  }

  /// Read the baseline, then fire the trigger. Unknown keys fail before any
  /// trigger; a failed trigger means there is nothing to wait for.
  pub async fn begin(
    &self,
    cluster_key: &str,
    options: WaitOptions,
  ) -> Result<SummaryWait, GroupError> {
    if options.poll_interval.is_zero() {
      return Err(GroupError::validation("poll_interval", "must be greater than zero"));
    }
    let baseline = self.read(cluster_key).await?;
    self.trigger(cluster_key).await?;
    Ok(SummaryWait::new(baseline, options))
  }

  /// Fire the engine without observing the result.
  pub async fn trigger(&self, cluster_key: &str) -> Result<(), GroupError> {
    if let Err(e) = self.engine.trigger(cluster_key).await {
      warn!(cluster_key, error = %e, "summary trigger failed");
      return Err(e);
    }
    info!(cluster_key, "summary triggered");
    Ok(())
  }

  /// Poll every `poll_interval` until a fresh summary, the deadline, or
  /// cancellation. The last sleep is clipped to the deadline.
  pub async fn observe(
    &self,
    wait: SummaryWait,
    cancel: &CancellationToken,
  ) -> Result<SummaryOutcome, GroupError> {
    let mut last = wait.baseline().clone();
    let mut polls = 0;

    loop {
      let pause = wait.poll_interval.min(wait.remaining());
      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(finish(&wait, last, WaitStatus::Cancelled, polls)),
        _ = tokio::time::sleep(pause) => {}
      }

      let group = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(finish(&wait, last, WaitStatus::Cancelled, polls)),
        read = self.read(&wait.cluster_key) => read?,
      };
      polls += 1;
      last = group;
      debug!(cluster_key = %wait.cluster_key, polls, "summary poll");

      if wait.is_fresh(&last) {
        info!(cluster_key = %wait.cluster_key, polls, "summary landed");
        return Ok(finish(&wait, last, WaitStatus::Completed, polls));
      }
      if wait.remaining().is_zero() {
        warn!(
          cluster_key = %wait.cluster_key,
          polls,
          "summary not ready before deadline, returning last observed group"
        );
        return Ok(finish(&wait, last, WaitStatus::TimedOut, polls));
      }
    }
  }

  /// Run `observe` on its own task under `cancel`.
  pub fn spawn_observer(
    self: &Arc<Self>,
    wait: SummaryWait,
    cancel: CancellationToken,
  ) -> JoinHandle<Result<SummaryOutcome, GroupError>> {
    let this = Arc::clone(self);
    tokio::spawn(async move {
      let cluster_key = wait.cluster_key.clone();
      let outcome = this.observe(wait, &cancel).await;
      if let Err(e) = &outcome {
        warn!(cluster_key = %cluster_key, error = %e, "background summary wait failed");
      }
      outcome
    })
  }

  async fn read(&self, cluster_key: &str) -> Result<ErrorGroup, GroupError> {
    let store = &self.store;
    with_read_retry(self.config.read_retries, self.config.retry_backoff, move || {
      store.get_by_cluster_key(cluster_key)
    })
    .await
  }
}

fn finish(wait: &SummaryWait, group: ErrorGroup, status: WaitStatus, polls: u32) -> SummaryOutcome {
  SummaryOutcome {
    group,
    status,
    polls,
    elapsed: wait.elapsed(),
  }
}
