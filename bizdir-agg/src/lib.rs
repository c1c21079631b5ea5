//! bizdir-agg library interface
//!
//! Multi-source business listing aggregation: provider adapters feed an ingest
//! service that resolves entities, settles co-location conflicts and merges
//! records; the result is persisted to SQLite and exported as JSON.

pub mod crawler;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod resolution;
pub mod scheduler;
pub mod sources;
pub mod types;

pub use crate::crawler::{CrawlReport, Crawler};
pub use crate::error::{AdapterError, AggError, AggResult, IngestError, ValidationError};
pub use crate::ingest::{IngestHandle, IngestService};
pub use crate::resolution::{AggregationStore, IngestOutcome, SourceTier, TrustClassifier};
pub use crate::types::{CanonicalRecord, NormalizedRecord, SourceTag};
