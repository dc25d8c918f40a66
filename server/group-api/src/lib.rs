//! Error group API
//!
//! HTTP boundary for the dashboard: listing, resolve, summary requests, and
//! ingest (plus a canned-sample producer for demos), all backed by `group_engine`.

mod config;
mod handlers;
mod state;
mod types;

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use handlers::{
  apply_summary, health, ingest, ingest_random, list_groups, resolve_group, summarize_group,
};
pub use state::AppState;

/// All routes over shared state. `{group}` is a numeric id for resolve and a
/// cluster key for the summary routes.
pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/groups", get(list_groups))
    .route("/groups/:group/resolve", post(resolve_group))
    .route("/groups/:group/summarize", post(summarize_group))
    .route("/groups/:group/summary", post(apply_summary))
    .route("/errors", post(ingest))
    .route("/errors/random", post(ingest_random))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
