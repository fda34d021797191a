//! Sync layer: the Escavador fetch client and the batch ingestion orchestrator.

pub mod http;
pub mod ingest;

pub use http::{ApiClient, ApiConfig, ConfigError, FetchFailure, Fetched, RetryPolicy, SyncError};
pub use ingest::{
    CaseFetcher, DEFAULT_BATCH_SIZE, IngestConfig, IngestPlan, IngestSummary, Ingestor, partition, plan,
    unresolved,
};
