//! Source Adapters
//!
//! Each provider adapter fetches listings from one external API, normalizes
//! them into `NormalizedRecord`s, and submits them to the ingest service with a
//! provider-specific source tag.
//!
//! # Error Isolation
//! - A rejected record is counted and logged; the crawl continues
//! - A failed request for one query/category is logged; the crawl continues
//! - Only a failure that leaves nothing to do (or a closed ingest channel)
//!   ends the crawl with `AdapterError`, and the crawler reports it without
//!   touching other adapters

pub mod companies_house;
pub mod foursquare;
pub mod openstreetmap;
pub mod yelp;

pub use companies_house::CompaniesHouseAdapter;
pub use foursquare::FoursquareAdapter;
pub use openstreetmap::OpenStreetMapAdapter;
pub use yelp::YelpAdapter;

use crate::error::{AdapterError, IngestError};
use crate::ingest::IngestHandle;
use crate::types::{NormalizedRecord, SourceTag};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// User-Agent sent to every provider
pub const USER_AGENT: &str = concat!("bizdir-agg/", env!("CARGO_PKG_VERSION"));

/// Direct (unkeyed) token-bucket limiter, one per adapter
pub type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Provider adapter
///
/// # Example
/// ```rust,ignore
/// let adapter = OpenStreetMapAdapter::new(bbox, 500)?;
/// let summary = adapter.crawl(&service.handle()).await?;
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider name for logging and reports
    fn name(&self) -> &'static str;

    /// Fetch listings and submit each one to `sink`
    async fn crawl(&self, sink: &IngestHandle) -> Result<CrawlSummary, AdapterError>;
}

/// Per-adapter crawl counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub provider: &'static str,
    /// Records accepted by the store
    pub ingested: usize,
    /// Records rejected by validation
    pub rejected: usize,
    /// Payload items skipped before ingest (e.g. unnamed POIs)
    pub skipped: usize,
}

impl CrawlSummary {
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            ingested: 0,
            rejected: 0,
            skipped: 0,
        }
    }

    /// Records submitted so far, accepted or not
    pub fn submitted(&self) -> usize {
        self.ingested + self.rejected
    }
}

/// Submit one record, folding validation failures into the summary
pub(crate) async fn forward(
    sink: &IngestHandle,
    summary: &mut CrawlSummary,
    record: NormalizedRecord,
    source: SourceTag,
) -> Result<(), AdapterError> {
    match sink.submit(record, source.clone()).await {
        Ok(outcome) => {
            summary.ingested += 1;
            debug!(provider = summary.provider, source = %source, outcome = ?outcome, "Record ingested");
            Ok(())
        }
        Err(IngestError::Validation(e)) => {
            summary.rejected += 1;
            debug!(provider = summary.provider, source = %source, error = %e, "Record rejected");
            Ok(())
        }
        Err(IngestError::Closed) => Err(AdapterError::IngestClosed),
    }
}

/// HTTP client with the shared timeouts and User-Agent
pub(crate) fn build_http_client(provider: &str) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AdapterError::network(provider, e))
}

/// Rate limiter allowing `per_minute` requests per minute (minimum 1)
pub(crate) fn rate_limiter_per_minute(per_minute: u32) -> DirectRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Send a request and decode a JSON body, mapping failures to `AdapterError`
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::network(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AdapterError::parse(provider, e))
}

/// Join the non-empty address parts with ", "
pub(crate) fn join_address<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Uppercase the first character, lowercase the rest
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestService;
    use crate::resolution::AggregationStore;

    #[test]
    fn test_join_address_skips_blank_parts() {
        let address = join_address([Some("12"), None, Some(" "), Some("High Street"), Some("London")]);
        assert_eq!(address, "12, High Street, London");
    }

    #[test]
    fn test_join_address_all_missing() {
        assert_eq!(join_address([None, None]), "");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("restaurant"), "Restaurant");
        assert_eq!(capitalize("FAST_FOOD"), "Fast_food");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_crawl_summary_submitted() {
        let mut summary = CrawlSummary::new("test");
        summary.ingested = 3;
        summary.rejected = 2;
        summary.skipped = 7;
        assert_eq!(summary.submitted(), 5);
    }

    #[tokio::test]
    async fn test_forward_counts_rejection_and_continues() {
        let service = IngestService::spawn(AggregationStore::new(), 8);
        let handle = service.handle();
        let mut summary = CrawlSummary::new("test");

        forward(
            &handle,
            &mut summary,
            NormalizedRecord::new("", "1 High Street"),
            SourceTag::new("osm_1"),
        )
        .await
        .unwrap();
        forward(
            &handle,
            &mut summary,
            NormalizedRecord::new("Acme", "1 High Street"),
            SourceTag::new("osm_2"),
        )
        .await
        .unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.ingested, 1);

        drop(handle);
        let store = service.finish().await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_forward_to_closed_ingest_ends_crawl() {
        let mut summary = CrawlSummary::new("test");
        let result = forward(
            &IngestHandle::closed(),
            &mut summary,
            NormalizedRecord::new("Acme", "1 High Street"),
            SourceTag::new("osm_1"),
        )
        .await;

        assert!(matches!(result, Err(AdapterError::IngestClosed)));
        assert_eq!(summary.submitted(), 0);
    }
}
