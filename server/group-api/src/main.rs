//! Binary entrypoint for the group API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use group_api::{AppConfig, AppState};
use group_engine::{Aggregator, GroupStore, HttpSummaryEngine, PgGroupStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,group_api=debug,group_engine=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::from_env().context("Failed to load configuration")?;

  let pg = PgGroupStore::connect(&config.database_url)
    .await
    .context("Failed to connect to database")?;
  pg.ensure_schema().await.context("Failed to apply schema")?;
  tracing::info!("Database ready");

  let store: Arc<dyn GroupStore> = Arc::new(pg);
  let engine = Arc::new(
    HttpSummaryEngine::new(config.engine.clone()).context("Failed to build summary engine client")?,
  );
  let shutdown = CancellationToken::new();
  let state = Arc::new(AppState::new(
    Arc::clone(&store),
    engine,
    config.core.clone(),
    shutdown.clone(),
  ));

  let sweeper = Aggregator::new(Arc::clone(&store), config.core.clone());
  let sweep_every = config.sweep_every;
  let sweep_cancel = shutdown.child_token();
  tokio::spawn(async move { sweeper.run_quiet_sweeper(sweep_every, sweep_cancel).await });

  let app = group_api::router(state);
  let addr = SocketAddr::new(config.bind_addr, config.port);
  tracing::info!("group-api listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .context("Failed to bind to address")?;
  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = tokio::signal::ctrl_c().await;
      tracing::info!("Shutting down, cancelling background summary waits");
      shutdown.cancel();
    })
    .await
    .context("Server error")?;

  Ok(())
}
