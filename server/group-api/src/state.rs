//! Shared handler state.

use std::sync::Arc;

use group_engine::{
  Aggregator, Config, GroupStore, ResolutionController, SummarizationOrchestrator, SummaryEngine,
};
use tokio_util::sync::CancellationToken;

pub struct AppState {
  pub store: Arc<dyn GroupStore>,
  pub controller: ResolutionController,
  pub aggregator: Aggregator,
  pub config: Config,
  pub shutdown: CancellationToken,
}

impl AppState {
  pub fn new(
    store: Arc<dyn GroupStore>,
    engine: Arc<dyn SummaryEngine>,
    config: Config,
    shutdown: CancellationToken,
  ) -> Self {
    let orchestrator = Arc::new(SummarizationOrchestrator::new(
      Arc::clone(&store),
      engine,
      config.clone(),
    ));
    Self {
      controller: ResolutionController::new(Arc::clone(&store), orchestrator, shutdown.clone()),
      aggregator: Aggregator::new(Arc::clone(&store), config.clone()),
      store,
      config,
      shutdown,
    }
  }
}
