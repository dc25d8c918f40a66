//! Service configuration from the environment.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use group_engine::{Config, EngineConfig};

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  pub bind_addr: IpAddr,
  pub port: u16,
  pub engine: EngineConfig,
  pub core: Config,
  /// How often the OPEN -> QUIET sweep runs.
  pub sweep_every: Duration,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Build from any key lookup; `from_env` passes the process environment.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let database_url = lookup("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

    let port = match lookup("PORT") {
      Some(p) => p.parse::<u16>().context("PORT must be a valid u16")?,
      None => 5005,
    };
    let bind_addr = match lookup("BIND_ADDR") {
      Some(a) => a.parse::<IpAddr>().context("BIND_ADDR must be an IP address")?,
      None => IpAddr::from([127, 0, 0, 1]),
    };

    let mut engine = EngineConfig::default();
    if let Some(url) = lookup("SUMMARY_ENGINE_URL") {
      engine.base_url = url;
    }
    engine.username = lookup("SUMMARY_ENGINE_USER");
    engine.password = lookup("SUMMARY_ENGINE_PASSWORD");

    let mut core = Config::default();
    if let Some(ms) = lookup("POLL_INTERVAL_MS") {
      core.poll_interval = Duration::from_millis(ms.parse::<u64>().context("POLL_INTERVAL_MS")?);
    }
    if let Some(ms) = lookup("MAX_WAIT_MS") {
      core.max_wait = Duration::from_millis(ms.parse::<u64>().context("MAX_WAIT_MS")?);
    }
    if let Some(min) = lookup("QUIESCENCE_MINUTES") {
      core.quiescence_window = chrono::Duration::minutes(min.parse::<i64>().context("QUIESCENCE_MINUTES")?);
    }
    if core.poll_interval.is_zero() {
      return Err(anyhow!("POLL_INTERVAL_MS must be greater than zero"));
    }

    Ok(Self {
      database_url,
      bind_addr,
      port,
      engine,
      core,
      sweep_every: Duration::from_secs(60),
    })
  }
}
