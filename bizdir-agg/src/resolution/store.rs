//! Aggregation Store
//!
//! The single mutable state of an aggregation run: canonical records keyed by
//! identity key, plus a location index mapping each location key to the
//! identity key occupying it.
//!
//! # Ownership
//! The store owns every record. The location index holds identity keys only,
//! never records, so removal has a single owner to update.
//!
//! # Ingest Sequence
//! 1. Validate required fields
//! 2. Derive identity and location keys
//! 3. If the location key is held by a different identity, apply the conflict rule
//! 4. Otherwise merge into the existing identity, or create a new canonical record

use super::conflict::{resolve_location_conflict, ConflictDecision};
use super::keys::{IdentityKey, LocationKey};
use super::merge::merge_into;
use super::tier::TrustClassifier;
use crate::error::ValidationError;
use crate::types::{CanonicalRecord, NormalizedRecord, SourceTag};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// What a successful ingest did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New canonical record created
    Created,
    /// Folded into the existing record with the same identity key
    Merged,
    /// A co-located registry-tier record was discarded in favour of this one
    Replaced { superseded: IdentityKey },
}

/// Per-run ingest counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub created: usize,
    pub merged: usize,
    pub replaced: usize,
    pub rejected: usize,
}

/// Identity-keyed canonical records with a co-location index
#[derive(Debug, Default)]
pub struct AggregationStore {
    classifier: TrustClassifier,
    records: BTreeMap<IdentityKey, CanonicalRecord>,
    location_index: HashMap<LocationKey, IdentityKey>,
    stats: StoreStats,
}

impl AggregationStore {
    /// Empty store using the default registry prefixes
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with a custom trust classifier
    pub fn with_classifier(classifier: TrustClassifier) -> Self {
        Self {
            classifier,
            ..Self::default()
        }
    }

    /// Ingest one record observed from `source`
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty name or address, or for invalid
    /// coordinates or rating. The store is unchanged in that case.
    pub fn ingest(
        &mut self,
        record: NormalizedRecord,
        source: SourceTag,
    ) -> Result<IngestOutcome, ValidationError> {
        if let Err(e) = validate(&record) {
            self.stats.rejected += 1;
            warn!(source = %source, error = %e, "Rejected record");
            return Err(e);
        }

        let identity = IdentityKey::for_record(&record);
        let location = LocationKey::for_record(&record);

        if let Some(location) = location {
            if let Some(occupant_key) = self.occupant_key(&location) {
                let decision = match self.records.get(&occupant_key) {
                    Some(occupant) => resolve_location_conflict(
                        &self.classifier,
                        &identity,
                        &source,
                        &occupant_key,
                        occupant,
                    ),
                    None => ConflictDecision::NoConflict,
                };

                if decision == ConflictDecision::ReplaceOccupant {
                    info!(
                        location = %location,
                        superseded = %occupant_key,
                        source = %source,
                        "Location conflict: replacing registry entry"
                    );
                    self.replace(occupant_key.clone(), identity, location, record, source);
                    self.stats.replaced += 1;
                    return Ok(IngestOutcome::Replaced {
                        superseded: occupant_key,
                    });
                }
            }
        }

        if let Some(existing) = self.records.get_mut(&identity) {
            merge_into(&self.classifier, existing, record, source);
            self.stats.merged += 1;
            return Ok(IngestOutcome::Merged);
        }

        debug!(identity = %identity, source = %source, "Created canonical record");
        self.records
            .insert(identity.clone(), CanonicalRecord::new(record, source));
        if let Some(location) = location {
            self.location_index.insert(location, identity);
        }
        self.stats.created += 1;
        Ok(IngestOutcome::Created)
    }

    /// Canonical records in identity-key order
    pub fn all_records(&self) -> impl Iterator<Item = &CanonicalRecord> + '_ {
        self.records.values()
    }

    /// Snapshot of the canonical set in identity-key order
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records.into_values().collect()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&CanonicalRecord> {
        self.records.get(key)
    }

    /// Identity key currently occupying `location`
    pub fn occupant(&self, location: &LocationKey) -> Option<&IdentityKey> {
        self.location_index
            .get(location)
            .filter(|key| self.records.contains_key(*key))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    pub fn classifier(&self) -> &TrustClassifier {
        &self.classifier
    }

    /// Occupant of `location`, dropping the index entry if it points at a removed record
    fn occupant_key(&mut self, location: &LocationKey) -> Option<IdentityKey> {
        let key = self.location_index.get(location)?.clone();
        if self.records.contains_key(&key) {
            Some(key)
        } else {
            self.location_index.remove(location);
            None
        }
    }

    /// Discard `superseded` and install the incoming record with fresh provenance
    fn replace(
        &mut self,
        superseded: IdentityKey,
        identity: IdentityKey,
        location: LocationKey,
        record: NormalizedRecord,
        source: SourceTag,
    ) {
        self.remove_record(&superseded);
        // An existing record under the incoming identity is overwritten wholesale
        if self.records.contains_key(&identity) {
            self.remove_record(&identity);
        }

        self.records
            .insert(identity.clone(), CanonicalRecord::new(record, source));
        self.location_index.insert(location, identity);
    }

    fn remove_record(&mut self, key: &IdentityKey) {
        self.records.remove(key);
        self.location_index.retain(|_, occupant| occupant != key);
    }
}

/// Reject records the engine cannot key or store
pub fn validate(record: &NormalizedRecord) -> Result<(), ValidationError> {
    if record.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }

    if record.address.trim().is_empty() {
        return Err(ValidationError::MissingAddress {
            name: record.name.clone(),
        });
    }

    if let Some(coordinates) = record.coordinates {
        if !coordinates.is_valid() {
            return Err(ValidationError::InvalidCoordinates {
                name: record.name.clone(),
                latitude: coordinates.latitude,
                longitude: coordinates.longitude,
            });
        }
    }

    if let Some(rating) = record.average_rating {
        if !rating.is_finite() {
            return Err(ValidationError::InvalidRating {
                name: record.name.clone(),
            });
        }
    }

    Ok(())
}
