//! Merge Engine
//!
//! Field-by-field policy for folding an incoming record into the existing
//! canonical record with the same identity key.
//!
//! # Field Policy
//! - **name, category**: registry-tier existing + open-tier incoming → overwrite
//!   (each only with a non-empty incoming value); open-tier existing +
//!   registry-tier incoming → keep. A missing category is still filled.
//! - **coordinates, opening_hours, price_range**: fill if missing, never overwritten
//! - **average_rating**: adopt if missing; otherwise the mean of the stored and
//!   incoming values (pairwise, not a running mean over all contributions)
//! - **provenance**: incoming tag appended
//! - **last_updated**: set to now, unconditionally

use super::tier::{SourceTier, TrustClassifier};
use crate::types::{CanonicalRecord, NormalizedRecord, SourceTag};
use chrono::Utc;
use tracing::debug;

/// Merge `incoming` into `existing` in place
///
/// Returns the names of the fields whose values changed (provenance and
/// last_updated always change and are not listed).
pub fn merge_into(
    classifier: &TrustClassifier,
    existing: &mut CanonicalRecord,
    incoming: NormalizedRecord,
    source: SourceTag,
) -> Vec<&'static str> {
    let existing_tier = classifier.classify_provenance(&existing.provenance);
    let incoming_tier = classifier.classify(&source);
    let mut updated = Vec::new();

    let NormalizedRecord {
        name,
        address: _,
        coordinates,
        category,
        opening_hours,
        average_rating,
        price_range,
    } = incoming;
    let category = category.filter(|c| !c.trim().is_empty());
    let business = &mut existing.business;

    if existing_tier == SourceTier::Registry && incoming_tier == SourceTier::Open {
        if !name.trim().is_empty() && business.name != name {
            business.name = name;
            updated.push("name");
        }
        if let Some(category) = &category {
            if business.category.as_ref() != Some(category) {
                business.category = Some(category.clone());
                updated.push("category");
            }
        }
    }

    if business.category.is_none() {
        if let Some(category) = category {
            business.category = Some(category);
            updated.push("category");
        }
    }

    if business.coordinates.is_none() && coordinates.is_some() {
        business.coordinates = coordinates;
        updated.push("coordinates");
    }

    if business.opening_hours.is_none() && opening_hours.is_some() {
        business.opening_hours = opening_hours;
        updated.push("opening_hours");
    }

    if let Some(rating) = average_rating {
        business.average_rating = Some(match business.average_rating {
            Some(current) => (current + rating) / 2.0,
            None => rating,
        });
        updated.push("average_rating");
    }

    if business.price_range.is_none() && price_range.is_some() {
        business.price_range = price_range;
        updated.push("price_range");
    }

    existing.provenance.push(source);
    existing.last_updated = Utc::now();

    debug!(
        existing_tier = %existing_tier,
        incoming_tier = %incoming_tier,
        updated = ?updated,
        provenance = existing.provenance.len(),
        "Merged record"
    );

    updated
}
