//! Foursquare Places Adapter
//!
//! Searches Foursquare Places (v3) near a location, one request per category
//! group. Foursquare rates venues on a 10-point scale; ratings are halved into
//! the 0.0-5.0 range used everywhere else.

use super::{
    build_http_client, fetch_json, forward, rate_limiter_per_minute, CrawlSummary,
    DirectRateLimiter, SourceAdapter,
};
use crate::error::AdapterError;
use crate::ingest::IngestHandle;
use crate::types::{Coordinates, NormalizedRecord, PriceRange, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

const PROVIDER: &str = "foursquare";
const SEARCH_URL: &str = "https://api.foursquare.com/v3/places/search";
const REQUESTS_PER_MINUTE: u32 = 600;
const PAGE_SIZE: &str = "50";

/// Category group IDs: dining, bars, retail, business services, community
const CATEGORY_IDS: &[&str] = &["13065", "13003", "19014", "17069", "12000"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Place>,
}

/// One Foursquare place (fields used by the adapter)
#[derive(Debug, Deserialize)]
pub struct Place {
    pub fsq_id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub location: PlaceLocation,
    pub geocodes: Option<Geocodes>,
    #[serde(default)]
    pub categories: Vec<PlaceCategory>,
    pub price: Option<u8>,
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaceLocation {
    pub formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Geocodes {
    pub main: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceCategory {
    pub name: String,
}

/// Foursquare Places adapter
pub struct FoursquareAdapter {
    client: Client,
    api_key: String,
    location: String,
    limit: usize,
    rate_limiter: DirectRateLimiter,
}

impl FoursquareAdapter {
    pub fn new(
        api_key: String,
        location: impl Into<String>,
        limit: usize,
    ) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_http_client(PROVIDER)?,
            api_key,
            location: location.into(),
            limit,
            rate_limiter: rate_limiter_per_minute(REQUESTS_PER_MINUTE),
        })
    }

    async fn search(&self, category_id: &str) -> Result<Vec<Place>, AdapterError> {
        self.rate_limiter.until_ready().await;
        let request = self
            .client
            .get(SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("near", self.location.as_str()),
                ("categories", category_id),
                ("limit", PAGE_SIZE),
            ]);

        let response: SearchResponse = fetch_json(PROVIDER, request).await?;
        Ok(response.results)
    }
}

#[async_trait]
impl SourceAdapter for FoursquareAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn crawl(&self, sink: &IngestHandle) -> Result<CrawlSummary, AdapterError> {
        info!(location = %self.location, limit = self.limit, "Starting Foursquare crawl");
        let mut summary = CrawlSummary::new(PROVIDER);

        'categories: for category_id in CATEGORY_IDS {
            let places = match self.search(category_id).await {
                Ok(places) => places,
                Err(e) => {
                    warn!(category = %category_id, error = %e, "Foursquare search failed");
                    continue;
                }
            };

            for place in places {
                if summary.submitted() >= self.limit {
                    break 'categories;
                }
                let (record, tag) = place_to_record(place);
                forward(sink, &mut summary, record, tag).await?;
            }
        }

        info!(
            ingested = summary.ingested,
            rejected = summary.rejected,
            "Foursquare crawl complete"
        );
        Ok(summary)
    }
}

/// Normalize a Foursquare place
pub fn place_to_record(place: Place) -> (NormalizedRecord, SourceTag) {
    let mut record = NormalizedRecord::new(
        place.name.unwrap_or_default(),
        place.location.formatted_address.unwrap_or_default(),
    );

    record.coordinates = place
        .geocodes
        .and_then(|g| g.main)
        .and_then(|main| Coordinates::from_parts(main.latitude, main.longitude));
    record.category = place.categories.into_iter().next().map(|c| c.name);
    record.average_rating = place.rating.map(|rating| rating / 2.0);
    record.price_range = place.price.and_then(PriceRange::from_level);

    (record, SourceTag::for_provider(PROVIDER, &place.fsq_id))
}
