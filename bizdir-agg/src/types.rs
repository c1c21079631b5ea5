//! Core Types for bizdir-agg
//!
//! Defines the normalized business record every source adapter produces and the
//! canonical record held by the aggregation store.
//!
//! # Invariants
//! - Latitude and longitude are one `Coordinates` value: both present or both absent.
//! - `Provenance` cannot be empty; it is created from the first contributing source tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Field Types
// ============================================================================

/// Geographic position (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build coordinates from provider fields; a lone half is discarded
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Some(Self::new(lat, lng)),
            _ => None,
        }
    }

    /// Finite and within ±90 / ±180
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

/// Opening hours as reported by a provider
///
/// Either a day-label → hours mapping or a single free-text schedule
/// (e.g. OSM's `Mo-Fr 09:00-17:00`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpeningHours {
    Schedule(BTreeMap<String, String>),
    Raw(String),
}

/// Ordered price band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceRange {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    Luxury,
}

impl PriceRange {
    /// Map a numeric provider level (1-4) to a price band
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Budget),
            2 => Some(Self::Moderate),
            3 => Some(Self::Expensive),
            4 => Some(Self::Luxury),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "$",
            Self::Moderate => "$$",
            Self::Expensive => "$$$",
            Self::Luxury => "$$$$",
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "$" => Ok(Self::Budget),
            "$$" => Ok(Self::Moderate),
            "$$$" => Ok(Self::Expensive),
            "$$$$" => Ok(Self::Luxury),
            other => Err(format!("unknown price range '{}'", other)),
        }
    }
}

/// Source tag identifying one provider record (e.g. `osm_1234`)
///
/// Tags are unique per provider record by construction, so provenance never
/// deduplicates them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTag(String);

impl SourceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag built from a provider prefix and that provider's record id
    pub fn for_provider(provider: &str, record_id: impl fmt::Display) -> Self {
        Self(format!("{}_{}", provider, record_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Non-empty list of source tags that contributed to a canonical record
///
/// Insertion order is kept for audit; equality ignores order.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Provenance(Vec<SourceTag>);

impl Provenance {
    pub fn new(first: SourceTag) -> Self {
        Self(vec![first])
    }

    pub fn push(&mut self, tag: SourceTag) {
        self.0.push(tag);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceTag> {
        self.0.iter()
    }

    pub fn contains(&self, tag: &SourceTag) -> bool {
        self.0.contains(tag)
    }
}

impl PartialEq for Provenance {
    fn eq(&self, other: &Self) -> bool {
        let mut left: Vec<&SourceTag> = self.0.iter().collect();
        let mut right: Vec<&SourceTag> = other.0.iter().collect();
        left.sort();
        right.sort();
        left == right
    }
}

impl Eq for Provenance {}

// ============================================================================
// Records
// ============================================================================

/// One business observation from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub category: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    /// Domain convention 0.0-5.0
    pub average_rating: Option<f64>,
    pub price_range: Option<PriceRange>,
}

impl NormalizedRecord {
    /// Record with only the required fields set
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            coordinates: None,
            category: None,
            opening_hours: None,
            average_rating: None,
            price_range: None,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_opening_hours(mut self, hours: OpeningHours) -> Self {
        self.opening_hours = Some(hours);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.average_rating = Some(rating);
        self
    }

    pub fn with_price_range(mut self, price: PriceRange) -> Self {
        self.price_range = Some(price);
        self
    }
}

/// The single merged representation of a business held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub business: NormalizedRecord,
    pub provenance: Provenance,
    /// Set on every mutation
    pub last_updated: DateTime<Utc>,
}

impl CanonicalRecord {
    /// First observation of a business; provenance is exactly `source`
    pub fn new(business: NormalizedRecord, source: SourceTag) -> Self {
        Self {
            business,
            provenance: Provenance::new(source),
            last_updated: Utc::now(),
        }
    }

    /// Flat, serialization-friendly view with stable field names
    pub fn to_exported(&self) -> ExportedBusiness {
        let business = &self.business;
        ExportedBusiness {
            name: business.name.clone(),
            address: business.address.clone(),
            latitude: business.coordinates.map(|c| c.latitude),
            longitude: business.coordinates.map(|c| c.longitude),
            category: business.category.clone(),
            opening_hours: business.opening_hours.clone(),
            average_rating: business.average_rating,
            price_range: business.price_range,
            source_urls: self.provenance.iter().map(|t| t.as_str().to_string()).collect(),
            last_updated: self.last_updated,
        }
    }
}

/// Exported business document
///
/// Field names are stable; optional fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedBusiness {
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub average_rating: Option<f64>,
    pub price_range: Option<PriceRange>,
    pub source_urls: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_from_parts_requires_both() {
        assert!(Coordinates::from_parts(Some(51.5), Some(-0.1)).is_some());
        assert!(Coordinates::from_parts(Some(51.5), None).is_none());
        assert!(Coordinates::from_parts(None, Some(-0.1)).is_none());
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_price_range_ordering_and_parsing() {
        assert!(PriceRange::Budget < PriceRange::Luxury);
        assert_eq!("$$".parse::<PriceRange>().unwrap(), PriceRange::Moderate);
        assert!("€€".parse::<PriceRange>().is_err());
        assert_eq!(PriceRange::from_level(3), Some(PriceRange::Expensive));
        assert_eq!(PriceRange::from_level(0), None);
    }

    #[test]
    fn test_price_range_serializes_as_symbols() {
        let json = serde_json::to_string(&PriceRange::Expensive).unwrap();
        assert_eq!(json, "\"$$$\"");
    }

    #[test]
    fn test_provenance_equality_ignores_order() {
        let mut a = Provenance::new(SourceTag::new("osm_1"));
        a.push(SourceTag::new("yelp_2"));
        let mut b = Provenance::new(SourceTag::new("yelp_2"));
        b.push(SourceTag::new("osm_1"));

        assert_eq!(a, b);
        assert_eq!(a.iter().next().unwrap().as_str(), "osm_1");
    }

    #[test]
    fn test_opening_hours_untagged_json() {
        let raw: OpeningHours = serde_json::from_str("\"Mo-Fr 09:00-17:00\"").unwrap();
        assert_eq!(raw, OpeningHours::Raw("Mo-Fr 09:00-17:00".to_string()));

        let schedule: OpeningHours = serde_json::from_str(r#"{"Monday":"09:00-17:00"}"#).unwrap();
        assert!(matches!(schedule, OpeningHours::Schedule(map) if map.len() == 1));
    }

    #[test]
    fn test_exported_nulls() {
        let record = CanonicalRecord::new(
            NormalizedRecord::new("Acme", "1 High Street"),
            SourceTag::new("osm_1"),
        );
        let json = serde_json::to_value(record.to_exported()).unwrap();

        assert!(json["latitude"].is_null());
        assert!(json["price_range"].is_null());
        assert_eq!(json["source_urls"][0], "osm_1");
    }
}
