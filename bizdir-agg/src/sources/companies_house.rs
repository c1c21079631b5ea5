//! Companies House Adapter (registry-tier)
//!
//! Searches the UK company register with a fixed set of queries, then fetches
//! each company profile for its registered office address and SIC codes.
//!
//! # API Reference
//! - Search: `GET /search/companies?q=...&items_per_page=100`
//! - Profile: `GET /company/{company_number}`
//! - Auth: HTTP basic, API key as username, empty password
//! - Rate limit: ~100 requests/minute
//!
//! Records are tagged `companies_house_{number}`, which the trust classifier
//! treats as registry-tier.

use super::{
    build_http_client, fetch_json, forward, join_address, rate_limiter_per_minute, CrawlSummary,
    DirectRateLimiter, SourceAdapter,
};
use crate::error::AdapterError;
use crate::ingest::IngestHandle;
use crate::resolution::tier::COMPANIES_HOUSE_PREFIX;
use crate::types::{NormalizedRecord, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

const PROVIDER: &str = "companies_house";
const API_URL: &str = "https://api.company-information.service.gov.uk";
const REQUESTS_PER_MINUTE: u32 = 100;
const ITEMS_PER_PAGE: &str = "100";

/// Search terms used to sweep the register
const SEARCH_QUERIES: &[&str] = &[
    "restaurant",
    "cafe",
    "hotel",
    "shop",
    "limited",
    "services",
    "consulting",
    "retail",
    "construction",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    company_number: Option<String>,
}

/// Company profile payload (fields used by the adapter)
#[derive(Debug, Deserialize)]
pub struct CompanyProfile {
    pub company_number: String,
    pub company_name: Option<String>,
    #[serde(default)]
    pub registered_office_address: RegisteredOffice,
    #[serde(default)]
    pub sic_codes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisteredOffice {
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub locality: Option<String>,
    pub postal_code: Option<String>,
}

/// Companies House register adapter
pub struct CompaniesHouseAdapter {
    client: Client,
    api_key: String,
    limit: usize,
    rate_limiter: DirectRateLimiter,
}

impl CompaniesHouseAdapter {
    pub fn new(api_key: String, limit: usize) -> Result<Self, AdapterError> {
        Ok(Self {
            client: build_http_client(PROVIDER)?,
            api_key,
            limit,
            rate_limiter: rate_limiter_per_minute(REQUESTS_PER_MINUTE),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, AdapterError> {
        self.rate_limiter.until_ready().await;
        let request = self
            .client
            .get(format!("{}/search/companies", API_URL))
            .query(&[("q", query), ("items_per_page", ITEMS_PER_PAGE)])
            .basic_auth(&self.api_key, Some(""));

        let response: SearchResponse = fetch_json(PROVIDER, request).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.company_number)
            .collect())
    }

    async fn profile(&self, company_number: &str) -> Result<CompanyProfile, AdapterError> {
        self.rate_limiter.until_ready().await;
        let request = self
            .client
            .get(format!("{}/company/{}", API_URL, company_number))
            .basic_auth(&self.api_key, Some(""));

        fetch_json(PROVIDER, request).await
    }
}

#[async_trait]
impl SourceAdapter for CompaniesHouseAdapter {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn crawl(&self, sink: &IngestHandle) -> Result<CrawlSummary, AdapterError> {
        info!(limit = self.limit, "Starting Companies House crawl");
        let mut summary = CrawlSummary::new(PROVIDER);

        'queries: for query in SEARCH_QUERIES {
            if summary.submitted() >= self.limit {
                break;
            }

            let numbers = match self.search(query).await {
                Ok(numbers) => numbers,
                Err(e) => {
                    warn!(query = %query, error = %e, "Companies House search failed");
                    continue;
                }
            };

            for number in numbers {
                if summary.submitted() >= self.limit {
                    break 'queries;
                }

                let profile = match self.profile(&number).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(company_number = %number, error = %e, "Companies House profile lookup failed");
                        continue;
                    }
                };

                let (record, tag) = profile_to_record(profile);
                forward(sink, &mut summary, record, tag).await?;

                if summary.submitted() % 50 == 0 {
                    info!(processed = summary.submitted(), "Processed Companies House records");
                }
            }
        }

        info!(
            ingested = summary.ingested,
            rejected = summary.rejected,
            "Companies House crawl complete"
        );
        Ok(summary)
    }
}

/// Normalize a company profile
///
/// A missing company name yields an empty name, which the store rejects.
pub fn profile_to_record(profile: CompanyProfile) -> (NormalizedRecord, SourceTag) {
    let office = &profile.registered_office_address;
    let address = join_address([
        office.address_line_1.as_deref(),
        office.address_line_2.as_deref(),
        office.locality.as_deref(),
        office.postal_code.as_deref(),
    ]);

    let mut record = NormalizedRecord::new(profile.company_name.clone().unwrap_or_default(), address);
    record.category = profile
        .sic_codes
        .first()
        .map(|code| sic_to_category(code).to_string());

    let tag = SourceTag::for_provider(COMPANIES_HOUSE_PREFIX, &profile.company_number);
    (record, tag)
}

/// Map a SIC code to a coarse category by its 2-digit division
pub fn sic_to_category(sic_code: &str) -> &'static str {
    let division: String = sic_code.chars().take(2).collect();
    match division.as_str() {
        "56" => "Restaurant",
        "55" => "Hotel",
        "47" => "Retail",
        "68" => "Real Estate",
        "70" => "Consulting",
        "41" => "Construction",
        "62" => "Technology",
        "86" => "Healthcare",
        _ => "Business",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::{SourceTier, TrustClassifier};

    fn profile_json() -> &'static str {
        r#"{
            "company_number": "01234567",
            "company_name": "ACME CAFE LIMITED",
            "registered_office_address": {
                "address_line_1": "1 High Street",
                "locality": "London",
                "postal_code": "SW1A 1AA"
            },
            "sic_codes": ["56102", "47110"]
        }"#
    }

    #[test]
    fn test_profile_to_record() {
        let profile: CompanyProfile = serde_json::from_str(profile_json()).unwrap();
        let (record, tag) = profile_to_record(profile);

        assert_eq!(record.name, "ACME CAFE LIMITED");
        assert_eq!(record.address, "1 High Street, London, SW1A 1AA");
        assert_eq!(record.category.as_deref(), Some("Restaurant"));
        assert!(record.coordinates.is_none());
        assert_eq!(tag.as_str(), "companies_house_01234567");
    }

    #[test]
    fn test_tag_is_registry_tier() {
        let profile: CompanyProfile = serde_json::from_str(profile_json()).unwrap();
        let (_, tag) = profile_to_record(profile);
        assert_eq!(TrustClassifier::default().classify(&tag), SourceTier::Registry);
    }

    #[test]
    fn test_profile_without_name_or_sic() {
        let profile: CompanyProfile =
            serde_json::from_str(r#"{"company_number": "99"}"#).unwrap();
        let (record, _) = profile_to_record(profile);

        assert!(record.name.is_empty());
        assert!(record.address.is_empty());
        assert!(record.category.is_none());
    }

    #[test]
    fn test_sic_to_category() {
        assert_eq!(sic_to_category("55100"), "Hotel");
        assert_eq!(sic_to_category("62020"), "Technology");
        assert_eq!(sic_to_category("99999"), "Business");
        assert_eq!(sic_to_category("5"), "Business");
    }
}
