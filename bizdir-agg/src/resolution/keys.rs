//! Identity and Location Key Generators
//!
//! Deterministic, inspectable deduplication keys:
//! - **Identity key**: lowercase trimmed name + `_` + lowercase first 20 characters of the address
//! - **Location key**: latitude and longitude each rounded to 5 decimal places (~1.1 m)
//!
//! The location key stores the rounded values as scaled integers so that equal
//! rounded coordinates always compare equal, with no float formatting involved.

use crate::types::{Coordinates, NormalizedRecord};
use std::fmt;

/// Number of address characters contributing to the identity key
pub const ADDRESS_PREFIX_CHARS: usize = 20;

/// Decimal places kept by the location key
pub const LOCATION_DECIMALS: u32 = 5;

const LOCATION_SCALE: f64 = 100_000.0;

/// Deduplication key from normalized name and address prefix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Derive the identity key; caller has already rejected empty name/address
    pub fn for_record(record: &NormalizedRecord) -> Self {
        let name = record.name.trim().to_lowercase();
        let address_prefix: String = record.address.chars().take(ADDRESS_PREFIX_CHARS).collect();
        Self(format!("{}_{}", name, address_prefix.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse geospatial key from rounded coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey {
    lat_e5: i64,
    lng_e5: i64,
}

impl LocationKey {
    /// `None` when the record carries no coordinates
    pub fn for_record(record: &NormalizedRecord) -> Option<Self> {
        record.coordinates.map(Self::from_coordinates)
    }

    pub fn from_coordinates(coordinates: Coordinates) -> Self {
        Self {
            lat_e5: scale(coordinates.latitude),
            lng_e5: scale(coordinates.longitude),
        }
    }

    /// Rounded latitude in degrees
    pub fn latitude(&self) -> f64 {
        self.lat_e5 as f64 / LOCATION_SCALE
    }

    /// Rounded longitude in degrees
    pub fn longitude(&self) -> f64 {
        self.lng_e5 as f64 / LOCATION_SCALE
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.lat_e5)?;
        f.write_str("_")?;
        write_scaled(f, self.lng_e5)
    }
}

fn scale(degrees: f64) -> i64 {
    (degrees * LOCATION_SCALE).round() as i64
}

fn write_scaled(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let divisor = 10u64.pow(LOCATION_DECIMALS);
    write!(
        f,
        "{}{}.{:0width$}",
        sign,
        abs / divisor,
        abs % divisor,
        width = LOCATION_DECIMALS as usize
    )
}
