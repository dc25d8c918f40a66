//! Error-group lifecycle and summarization orchestration.
//!
//! Groups aggregate ingested error events by cluster key and move through
//! OPEN / QUIET / RESOLVED. Summaries come from an external engine that is
//! triggered fire-and-forget and observed by polling the store under a hard
//! wall-clock ceiling.

pub mod cluster_key;
pub mod config;
pub mod controller;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod orchestrator;
pub mod store;
pub mod summary;
pub mod trigger;
pub mod types;

pub use config::{Config, EngineConfig};
pub use controller::{ResolutionController, SummaryTicket};
pub use error::GroupError;
pub use ingest::{Aggregator, SampleError, SAMPLE_ERRORS};
pub use orchestrator::{SummarizationOrchestrator, SummaryOutcome, SummaryWait, WaitOptions, WaitStatus};
pub use store::{GroupStore, InMemoryGroupStore, PgGroupStore};
pub use trigger::{HttpSummaryEngine, SummaryEngine};
pub use types::{AiSummary, ErrorEvent, ErrorGroup, GroupStatus, GroupsSnapshot, InboundError, Ingested};
