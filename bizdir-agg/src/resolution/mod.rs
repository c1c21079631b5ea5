// Resolution Module - Entity Resolution and Merge Engine
//
// Flow per ingested record:
//   keys (identity + location) → conflict (co-located, different identity)
//   → merge (same identity) or create → store indices

pub mod conflict;
pub mod keys;
pub mod merge;
pub mod store;
pub mod tier;

pub use conflict::{resolve_location_conflict, ConflictDecision};
pub use keys::{IdentityKey, LocationKey};
pub use merge::merge_into;
pub use store::{AggregationStore, IngestOutcome, StoreStats};
pub use tier::{SourceTier, TrustClassifier};
