//! Fire-and-forget trigger for the external summarization engine.

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::GroupError;

/// Starts a summarization job. No result comes back on this channel; the
/// engine writes its output to the store when done.
#[async_trait]
pub trait SummaryEngine: Send + Sync {
  async fn trigger(&self, cluster_key: &str) -> Result<(), GroupError>;
}

/// `POST {base_url}/groups/{cluster_key}/summarize` over HTTP.
pub struct HttpSummaryEngine {
  client: reqwest::Client,
  config: EngineConfig,
}

impl HttpSummaryEngine {
  pub fn new(config: EngineConfig) -> Result<Self, GroupError> {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout)
      .build()
      .map_err(|e| GroupError::trigger(format!("client setup: {}", e)))?;
    Ok(Self { client, config })
  }

  pub fn trigger_url(&self, cluster_key: &str) -> String {
    format!(
      "{}/groups/{}/summarize",
      self.config.base_url.trim_end_matches('/'),
      urlencoding::encode(cluster_key)
    )
  }
}

#[async_trait]
impl SummaryEngine for HttpSummaryEngine {
  async fn trigger(&self, cluster_key: &str) -> Result<(), GroupError> {
    let url = self.trigger_url(cluster_key);
    let mut request = self.client.post(&url);
    if let Some(user) = &self.config.username {
      request = request.basic_auth(user, self.config.password.as_ref());
    }

    let resp = request
      .send()
      .await
      .map_err(|e| GroupError::trigger(format!("engine unreachable: {}", e)))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let snippet: String = body.chars().take(200).collect();
      return Err(GroupError::trigger(format!(
        "engine rejected {}: {} {}",
        cluster_key, status, snippet
      )));
    }

    tracing::debug!(cluster_key, %status, "summary engine accepted trigger");
    Ok(())
  }
}
