//! Conflict Resolver
//!
//! Decides what happens when an incoming record lands on a location key already
//! occupied by a different identity key.
//!
//! The occupant is replaced iff it is registry-tier and the incoming source is
//! open-tier. Replacement is wholesale: the open-tier view supersedes the
//! registry entry instead of being merged field by field. Every other tier
//! combination leaves the occupant alone and the incoming record continues
//! through normal identity-key ingest.

use super::keys::IdentityKey;
use super::tier::{SourceTier, TrustClassifier};
use crate::types::{CanonicalRecord, SourceTag};

/// Outcome of a co-location check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Location is free or held by the same identity key
    NoConflict,
    /// Co-located with a different identity, occupant stays
    KeepOccupant,
    /// Occupant is superseded by the incoming record
    ReplaceOccupant,
}

/// Tier rule for replacing a co-located occupant
pub fn should_replace(occupant: SourceTier, incoming: SourceTier) -> bool {
    occupant == SourceTier::Registry && incoming == SourceTier::Open
}

/// Decide how an incoming record interacts with the current occupant of its location key
pub fn resolve_location_conflict(
    classifier: &TrustClassifier,
    incoming_key: &IdentityKey,
    incoming_source: &SourceTag,
    occupant_key: &IdentityKey,
    occupant: &CanonicalRecord,
) -> ConflictDecision {
    if occupant_key == incoming_key {
        return ConflictDecision::NoConflict;
    }

    let occupant_tier = classifier.classify_provenance(&occupant.provenance);
    let incoming_tier = classifier.classify(incoming_source);

    if should_replace(occupant_tier, incoming_tier) {
        ConflictDecision::ReplaceOccupant
    } else {
        ConflictDecision::KeepOccupant
    }
}
