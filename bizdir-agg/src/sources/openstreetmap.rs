//! OpenStreetMap Adapter (Overpass API)
//!
//! Issues one Overpass query for shop, amenity, tourism and office nodes inside
//! a bounding box. Needs no credentials, so the crawler always runs it.
//!
//! Unnamed nodes are skipped before ingest. Addresses are assembled from the
//! `addr:*` tags, falling back to `addr:full` and finally a placeholder.

use super::{
    build_http_client, capitalize, fetch_json, forward, join_address, rate_limiter_per_minute,
    CrawlSummary, DirectRateLimiter, SourceAdapter,
};
use crate::error::AdapterError;
use crate::ingest::IngestHandle;
use crate::types::{Coordinates, NormalizedRecord, OpeningHours, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

const PROVIDER: &str = "osm";
const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const REQUESTS_PER_MINUTE: u32 = 2;

/// Placeholder for nodes without any address tags
pub const ADDRESS_NOT_AVAILABLE: &str = "Address not available";

/// Tag keys checked, in order, for the category
const CATEGORY_KEYS: &[&str] = &["amenity", "shop", "tourism", "office"];

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// One Overpass node
#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// OpenStreetMap points-of-interest adapter
pub struct OpenStreetMapAdapter {
    client: Client,
    bbox: String,
    limit: usize,
    rate_limiter: DirectRateLimiter,
}

impl OpenStreetMapAdapter {
    /// `bbox` is `south,west,north,east`
    pub fn new(bbox: impl Into<String>, limit: usize) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_http_client(PROVIDER)?,
            bbox: bbox.into(),
            limit,
            rate_limiter: rate_limiter_per_minute(REQUESTS_PER_MINUTE),
        })
    }
}

#[async_trait]
impl SourceAdapter for OpenStreetMapAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn crawl(&self, sink: &IngestHandle) -> Result<CrawlSummary, AdapterError> {
        info!(bbox = %self.bbox, limit = self.limit, "Starting OpenStreetMap crawl");
        let mut summary = CrawlSummary::new(PROVIDER);

        self.rate_limiter.until_ready().await;
        let query = overpass_query(&self.bbox, self.limit);
        let request = self.client.post(OVERPASS_URL).form(&[("data", query)]);
        let response: OverpassResponse = fetch_json(PROVIDER, request).await?;

        debug!(elements = response.elements.len(), "Overpass response received");

        for element in response.elements {
            if summary.submitted() >= self.limit {
                break;
            }
            match element_to_record(element) {
                Some((record, tag)) => forward(sink, &mut summary, record, tag).await?,
                None => summary.skipped += 1,
            }
        }

        info!(
            ingested = summary.ingested,
            rejected = summary.rejected,
            skipped = summary.skipped,
            "OpenStreetMap crawl complete"
        );
        Ok(summary)
    }
}

/// Overpass QL for business-like nodes inside `bbox`
pub fn overpass_query(bbox: &str, limit: usize) -> String {
    format!(
        "[out:json][timeout:60];\n\
         (\n\
           node[\"shop\"]({bbox});\n\
           node[\"amenity\"~\"restaurant|cafe|pub|bar|bank|pharmacy\"]({bbox});\n\
           node[\"tourism\"~\"hotel|guest_house\"]({bbox});\n\
           node[\"office\"]({bbox});\n\
         );\n\
         out body {limit};"
    )
}

/// Normalize an Overpass node; `None` when the node has no name
pub fn element_to_record(element: OverpassElement) -> Option<(NormalizedRecord, SourceTag)> {
    let tags = &element.tags;
    let name = tags.get("name").map(|n| n.trim()).filter(|n| !n.is_empty())?;

    let mut address = join_address([
        tags.get("addr:housenumber").map(String::as_str),
        tags.get("addr:street").map(String::as_str),
        tags.get("addr:city").map(String::as_str),
        tags.get("addr:postcode").map(String::as_str),
    ]);
    if address.is_empty() {
        address = tags
            .get("addr:full")
            .map(|full| full.trim().to_string())
            .filter(|full| !full.is_empty())
            .unwrap_or_else(|| ADDRESS_NOT_AVAILABLE.to_string());
    }

    let category = CATEGORY_KEYS
        .iter()
        .find_map(|key| tags.get(*key))
        .map(|value| capitalize(value))
        .unwrap_or_else(|| "Business".to_string());

    let mut record = NormalizedRecord::new(name, address).with_category(category);
    record.coordinates = Coordinates::from_parts(element.lat, element.lon);
    record.opening_hours = tags
        .get("opening_hours")
        .map(|hours| OpeningHours::Raw(hours.clone()));

    Some((record, SourceTag::for_provider(PROVIDER, element.id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(json: &str) -> OverpassElement {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_element_to_record_full_tags() {
        let node = element(
            r#"{
                "id": 123,
                "lat": 51.5,
                "lon": -0.1,
                "tags": {
                    "name": "Acme Café",
                    "amenity": "cafe",
                    "addr:housenumber": "1",
                    "addr:street": "High Street",
                    "addr:city": "London",
                    "addr:postcode": "SW1A 1AA",
                    "opening_hours": "Mo-Fr 08:00-18:00"
                }
            }"#,
        );

        let (record, tag) = element_to_record(node).unwrap();
        assert_eq!(record.name, "Acme Café");
        assert_eq!(record.address, "1, High Street, London, SW1A 1AA");
        assert_eq!(record.category.as_deref(), Some("Cafe"));
        assert_eq!(record.coordinates, Some(Coordinates::new(51.5, -0.1)));
        assert_eq!(
            record.opening_hours,
            Some(OpeningHours::Raw("Mo-Fr 08:00-18:00".into()))
        );
        assert_eq!(tag.as_str(), "osm_123");
    }

    #[test]
    fn test_address_falls_back_to_full_then_placeholder() {
        let with_full = element(
            r#"{"id": 1, "tags": {"name": "Shop", "shop": "bakery", "addr:full": "2 Low Road, Leeds"}}"#,
        );
        let (record, _) = element_to_record(with_full).unwrap();
        assert_eq!(record.address, "2 Low Road, Leeds");
        assert_eq!(record.category.as_deref(), Some("Bakery"));
        assert!(record.coordinates.is_none());

        let bare = element(r#"{"id": 2, "tags": {"name": "Office", "office": "company"}}"#);
        let (record, _) = element_to_record(bare).unwrap();
        assert_eq!(record.address, ADDRESS_NOT_AVAILABLE);
        assert_eq!(record.category.as_deref(), Some("Company"));
    }

    #[test]
    fn test_unnamed_node_skipped() {
        let node = element(r#"{"id": 3, "lat": 51.0, "lon": 0.0, "tags": {"shop": "kiosk"}}"#);
        assert!(element_to_record(node).is_none());

        let no_tags = element(r#"{"id": 4, "lat": 51.0, "lon": 0.0}"#);
        assert!(element_to_record(no_tags).is_none());
    }

    #[test]
    fn test_category_defaults_to_business() {
        let node = element(r#"{"id": 5, "tags": {"name": "Thing"}}"#);
        let (record, _) = element_to_record(node).unwrap();
        assert_eq!(record.category.as_deref(), Some("Business"));
    }

    #[test]
    fn test_overpass_query_contains_bbox_and_limit() {
        let query = overpass_query("49.9,-7.6,58.7,1.8", 500);
        assert!(query.starts_with("[out:json]"));
        assert!(query.contains("node[\"shop\"](49.9,-7.6,58.7,1.8);"));
        assert!(query.ends_with("out body 500;"));
    }
}
