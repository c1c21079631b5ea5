//! Yelp Fusion Adapter
//!
//! Searches Yelp businesses near a location, one request per category alias.
//! The category alias searched becomes the record's category.

use super::{
    build_http_client, capitalize, fetch_json, forward, join_address, rate_limiter_per_minute,
    CrawlSummary, DirectRateLimiter, SourceAdapter,
};
use crate::error::AdapterError;
use crate::ingest::IngestHandle;
use crate::types::{Coordinates, NormalizedRecord, PriceRange, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

const PROVIDER: &str = "yelp";
const SEARCH_URL: &str = "https://api.yelp.com/v3/businesses/search";
const REQUESTS_PER_MINUTE: u32 = 300;
const PAGE_SIZE: &str = "50";

const CATEGORIES: &[&str] = &[
    "restaurants",
    "bars",
    "hotels",
    "shopping",
    "homeservices",
    "beautysvc",
    "health",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<YelpBusiness>,
}

/// One Yelp business (fields used by the adapter)
#[derive(Debug, Deserialize)]
pub struct YelpBusiness {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub location: YelpLocation,
    pub coordinates: Option<YelpCoordinates>,
    pub price: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YelpLocation {
    pub address1: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YelpCoordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Yelp Fusion adapter
pub struct YelpAdapter {
    client: Client,
    api_key: String,
    location: String,
    limit: usize,
    rate_limiter: DirectRateLimiter,
}

impl YelpAdapter {
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

    async fn search(&self, category: &str) -> Result<Vec<YelpBusiness>, AdapterError> {
        self.rate_limiter.until_ready().await;
        let request = self
            .client
            .get(SEARCH_URL)
            .bearer_auth(&self.api_key)
            .query(&[
                ("location", self.location.as_str()),
                ("categories", category),
                ("limit", PAGE_SIZE),
            ]);

        let response: SearchResponse = fetch_json(PROVIDER, request).await?;
        Ok(response.businesses)
    }
}

#[async_trait]
impl SourceAdapter for YelpAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn crawl(&self, sink: &IngestHandle) -> Result<CrawlSummary, AdapterError> {
        info!(location = %self.location, limit = self.limit, "Starting Yelp crawl");
        let mut summary = CrawlSummary::new(PROVIDER);

        'categories: for category in CATEGORIES {
            let businesses = match self.search(category).await {
                Ok(businesses) => businesses,
                Err(e) => {
                    warn!(category = %category, error = %e, "Yelp search failed");
                    continue;
                }
            };

            for business in businesses {
                if summary.submitted() >= self.limit {
                    break 'categories;
                }
                let (record, tag) = business_to_record(business, category);
                forward(sink, &mut summary, record, tag).await?;
            }
        }

        info!(
            ingested = summary.ingested,
            rejected = summary.rejected,
            "Yelp crawl complete"
        );
        Ok(summary)
    }
}

/// Normalize a Yelp business found under `category`
pub fn business_to_record(business: YelpBusiness, category: &str) -> (NormalizedRecord, SourceTag) {
    let location = &business.location;
    let address = join_address([
        location.address1.as_deref(),
        location.city.as_deref(),
        location.zip_code.as_deref(),
    ]);

    let mut record = NormalizedRecord::new(business.name.clone().unwrap_or_default(), address)
        .with_category(capitalize(category));
    record.coordinates = business
        .coordinates
        .as_ref()
        .and_then(|c| Coordinates::from_parts(c.latitude, c.longitude));
    record.average_rating = business.rating;
    record.price_range = business.price.as_deref().and_then(parse_price);

    (record, SourceTag::for_provider(PROVIDER, &business.id))
}

/// Price level from a run of one local currency symbol ("£", "€€", "$$$")
///
/// Mixed or unknown strings yield `None`.
fn parse_price(price: &str) -> Option<PriceRange> {
    let price = price.trim();
    let symbol = price.chars().next()?;
    if !matches!(symbol, '$' | '£' | '€') || price.chars().any(|c| c != symbol) {
        return None;
    }
    u8::try_from(price.chars().count())
        .ok()
        .and_then(PriceRange::from_level)
}
