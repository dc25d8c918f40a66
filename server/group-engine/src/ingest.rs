//! Ingestion aggregator: validates inbound errors, upserts their groups, and
//! demotes groups that went quiet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GroupError;
use crate::normalize;
use crate::store::GroupStore;
use crate::types::{InboundError, Ingested};

/// Canned reports for demos and smoke tests.
#[derive(Debug, Clone, Copy)]
pub struct SampleError {
  pub service: &'static str,
  pub error_type: &'static str,
  pub message: &'static str,
  pub path: &'static str,
}

impl SampleError {
  pub fn to_inbound(&self) -> InboundError {
    InboundError {
      service: self.service.to_string(),
      error_type: self.error_type.to_string(),
      message: self.message.to_string(),
      env: Some("prod".to_string()),
      path: Some(self.path.to_string()),
    }
  }
}

pub const SAMPLE_ERRORS: [SampleError; 8] = [
  SampleError {
    service: "user-api",
    error_type: "NullPointer",
    message: "Cannot read property 'x' of null at UserController.java:42",
    path: "/v1/users/123",
  },
  SampleError {
    service: "payment-api",
    error_type: "Timeout",
    message: "HTTP 504 while calling /charge on stripe-gateway, attempt=3",
    path: "/v1/payments/charge",
  },
  SampleError {
    service: "order-api",
    error_type: "DBError",
    message: "org.postgresql.util.PSQLException: connection pool exhausted on orders_db",
    path: "/v1/orders/checkout",
  },
  SampleError {
    service: "auth-service",
    error_type: "ValidationError",
    message: "JWT validation failed: token expired for user=42",
    path: "/v1/auth/refresh",
  },
  SampleError {
    service: "api-gateway",
    error_type: "RateLimitExceeded",
    message: "429 Too Many Requests from client IP 192.168.1.1",
    path: "/v1/resource",
  },
  SampleError {
    service: "payment-api",
    error_type: "UpstreamError",
    message: "HTTP 503 from stripe-gateway",
    path: "/v1/payments/process",
  },
  SampleError {
    service: "order-api",
    error_type: "ValidationError",
    message: "JSONDecodeError: Missing required field 'order_id'",
    path: "/v1/orders/create",
  },
  SampleError {
    service: "user-profile",
    error_type: "Timeout",
    message: "gRPC deadline exceeded calling profile-service",
    path: "/v1/profiles/lookup",
  },
];

/// One entry of `SAMPLE_ERRORS`, picked at random.
pub fn random_sample() -> &'static SampleError {
  &SAMPLE_ERRORS[rand::random::<usize>() % SAMPLE_ERRORS.len()]
}

pub struct Aggregator {
  store: Arc<dyn GroupStore>,
  config: Config,
}

impl Aggregator {
  pub fn new(store: Arc<dyn GroupStore>, config: Config) -> Self {
    Self { store, config }
  }

  /// Record one inbound error stamped with the current time.
  pub async fn record(&self, raw: &InboundError) -> Result<Ingested, GroupError> {
    self.record_at(raw, Utc::now()).await
  }

  /// Record a random entry from `SAMPLE_ERRORS`.
  pub async fn record_sample(&self) -> Result<Ingested, GroupError> {
    self.record(&random_sample().to_inbound()).await
  }

  /// Record one inbound error as of `now`.
  ///
  /// New keys create an OPEN group; existing keys bump `count` and
  /// `last_seen` and go back to OPEN, clearing any resolution.
  pub async fn record_at(
    &self,
    raw: &InboundError,
    now: DateTime<Utc>,
  ) -> Result<Ingested, GroupError> {
    let event = normalize::normalize(raw, now)?;
    let ingested = self.store.record_event(&event).await?;
    debug!(
      cluster_key = %event.cluster_key,
      trace_id = %event.trace_id,
      count = ingested.group.count,
      "error recorded"
    );
    Ok(ingested)
  }

  /// OPEN -> QUIET for groups silent longer than the quiescence window.
  pub async fn sweep_quiet(&self, now: DateTime<Utc>) -> Result<u64, GroupError> {
    let cutoff = now - self.config.quiescence_window;
    let moved = self.store.mark_quiet(cutoff).await?;
    if moved > 0 {
      info!(moved, "groups demoted to QUIET");
    }
    Ok(moved)
  }

  /// Sweep every `every` until `cancel` fires. Failed sweeps are logged and
  /// retried on the next tick.
  pub async fn run_quiet_sweeper(&self, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
      tokio::select! {
        _ = cancel.cancelled() => return,
        _ = ticker.tick() => {}
      }
      if let Err(e) = self.sweep_quiet(Utc::now()).await {
        warn!(error = %e, "quiet sweep failed");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cluster_key;
  use crate::store::InMemoryGroupStore;

  #[test]
  fn samples_pass_validation() {
    for sample in &SAMPLE_ERRORS {
      let event = normalize::normalize(&sample.to_inbound(), Utc::now()).unwrap();
      assert_eq!(event.env, "prod");
      assert_eq!(event.path, sample.path);
    }
  }

  #[tokio::test]
  async fn recorded_sample_lands_in_a_catalog_group() {
    let aggregator = Aggregator::new(Arc::new(InMemoryGroupStore::new()), Config::default());
    let out = aggregator.record_sample().await.unwrap();
    let known: Vec<String> = SAMPLE_ERRORS
      .iter()
      .map(|s| cluster_key::compute(s.service, s.error_type))
      .collect();
    assert!(known.contains(&out.group.cluster_key));
    assert_eq!(out.group.count, 1);
  }
}
