//! Crawl Orchestration
//!
//! One crawl run: build the enabled adapters, run them concurrently against a
//! single ingest service, then persist and export the merged record set.
//!
//! # Architecture
//! ```text
//! [companies_house] ─┐
//! [osm]             ─┼─ IngestHandle ─→ IngestService (owns AggregationStore)
//! [foursquare]      ─┤                          │ finish()
//! [yelp]            ─┘                          ↓
//!                                    upsert_businesses + export_json
//! ```
//!
//! An adapter that fails is logged and listed in `CrawlReport::failures`; the
//! other adapters and the rest of the run are unaffected.

use crate::db::{init_database_pool, upsert_businesses};
use crate::error::{AdapterError, AggResult};
use crate::export::export_json;
use crate::ingest::{IngestHandle, IngestService};
use crate::resolution::{AggregationStore, StoreStats, TrustClassifier};
use crate::sources::{
    CompaniesHouseAdapter, CrawlSummary, FoursquareAdapter, OpenStreetMapAdapter, SourceAdapter,
    YelpAdapter,
};
use crate::types::{NormalizedRecord, OpeningHours, PriceRange, SourceTag};
use bizdir_common::config::{resolve_api_key, TomlConfig};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const COMPANIES_HOUSE_KEY_ENV: &str = "COMPANIES_HOUSE_API_KEY";
pub const FOURSQUARE_KEY_ENV: &str = "FOURSQUARE_API_KEY";
pub const YELP_KEY_ENV: &str = "YELP_API_KEY";

/// Tag for records entered by hand rather than crawled
pub const MANUAL_ENTRY_TAG: &str = "manual_entry";

/// An adapter that could not complete its crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterFailure {
    pub provider: String,
    pub error: String,
}

/// Outcome of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Seed records accepted before adapters started
    pub seeded: usize,
    pub summaries: Vec<CrawlSummary>,
    pub failures: Vec<AdapterFailure>,
    pub stats: StoreStats,
    /// Canonical records after merging
    pub records: usize,
    pub persisted: usize,
    pub exported: usize,
}

impl CrawlReport {
    /// True when every adapter completed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs crawls for one root folder and configuration
pub struct Crawler {
    config: TomlConfig,
    database_path: PathBuf,
    export_path: PathBuf,
    seeds: Vec<(NormalizedRecord, SourceTag)>,
}

impl Crawler {
    pub fn new(config: TomlConfig, root_folder: &Path) -> Self {
        let database_path = config.database_path(root_folder);
        let export_path = config.export_path(root_folder);
        Self {
            config,
            database_path,
            export_path,
            seeds: Vec::new(),
        }
    }

    /// Records ingested at the start of every run, before any adapter
    pub fn with_seeds(mut self, seeds: Vec<(NormalizedRecord, SourceTag)>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Full crawl with the adapters enabled by the configuration
    pub async fn run(&self) -> AggResult<CrawlReport> {
        let (adapters, failures) = self.build_adapters();
        self.run_with_adapters(adapters, failures).await
    }

    /// Crawl with an explicit adapter set
    ///
    /// `failures` carries adapters that were already lost before the run
    /// (e.g. an HTTP client that could not be built).
    pub async fn run_with_adapters(
        &self,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        mut failures: Vec<AdapterFailure>,
    ) -> AggResult<CrawlReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        info!(adapters = adapters.len(), "Starting crawl");

        let classifier = TrustClassifier::new(&self.config.aggregation.registry_sources);
        let service = IngestService::spawn(
            AggregationStore::with_classifier(classifier),
            self.config.aggregation.channel_capacity,
        );

        let seeded = self.ingest_seeds(&service.handle()).await;

        let (providers, tasks): (Vec<_>, Vec<_>) = adapters
            .into_iter()
            .map(|adapter| {
                let handle = service.handle();
                let provider = adapter.name();
                let task = tokio::spawn(async move { adapter.crawl(&handle).await });
                (provider, task)
            })
            .unzip();

        let mut summaries = Vec::new();
        for (provider, joined) in providers.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => {
                    error!(provider = provider, error = %e, "Adapter failed");
                    failures.push(AdapterFailure {
                        provider: provider.to_string(),
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(provider = provider, error = %e, "Adapter task panicked or was cancelled");
                    failures.push(AdapterFailure {
                        provider: provider.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let store = service.finish().await?;
        let stats = store.stats();
        let records = store.into_records();

        let pool = init_database_pool(&self.database_path).await?;
        let persisted = upsert_businesses(&pool, &records).await?;
        pool.close().await;

        let exported = export_json(&records, &self.export_path)?;

        let report = CrawlReport {
            started_at,
            duration: started.elapsed(),
            seeded,
            summaries,
            failures,
            stats,
            records: records.len(),
            persisted,
            exported,
        };

        info!(
            records = report.records,
            created = stats.created,
            merged = stats.merged,
            replaced = stats.replaced,
            rejected = stats.rejected,
            failed_adapters = report.failures.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Crawl complete"
        );

        Ok(report)
    }

    async fn ingest_seeds(&self, handle: &IngestHandle) -> usize {
        let mut accepted = 0;
        for (record, tag) in &self.seeds {
            match handle.submit(record.clone(), tag.clone()).await {
                Ok(_) => accepted += 1,
                Err(e) => warn!(source = %tag, error = %e, "Seed record not ingested"),
            }
        }
        accepted
    }

    /// Adapters for every provider with credentials; OSM needs none
    fn build_adapters(&self) -> (Vec<Arc<dyn SourceAdapter>>, Vec<AdapterFailure>) {
        let providers = &self.config.providers;
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        let mut failures = Vec::new();

        match resolve_api_key(
            COMPANIES_HOUSE_KEY_ENV,
            providers.companies_house_api_key.as_deref(),
            "Companies House",
        ) {
            Some(key) => register(
                &mut adapters,
                &mut failures,
                "companies_house",
                CompaniesHouseAdapter::new(key, providers.companies_house_limit),
            ),
            None => warn!("Companies House API key not configured, skipping"),
        }

        register(
            &mut adapters,
            &mut failures,
            "osm",
            OpenStreetMapAdapter::new(&providers.openstreetmap_bbox, providers.openstreetmap_limit),
        );

        match resolve_api_key(
            FOURSQUARE_KEY_ENV,
            providers.foursquare_api_key.as_deref(),
            "Foursquare",
        ) {
            Some(key) => register(
                &mut adapters,
                &mut failures,
                "foursquare",
                FoursquareAdapter::new(key, &providers.search_location, providers.foursquare_limit),
            ),
            None => warn!("Foursquare API key not configured, skipping"),
        }

        match resolve_api_key(YELP_KEY_ENV, providers.yelp_api_key.as_deref(), "Yelp") {
            Some(key) => register(
                &mut adapters,
                &mut failures,
                "yelp",
                YelpAdapter::new(key, &providers.search_location, providers.yelp_limit),
            ),
            None => warn!("Yelp API key not configured, skipping"),
        }

        (adapters, failures)
    }
}

fn register<A: SourceAdapter + 'static>(
    adapters: &mut Vec<Arc<dyn SourceAdapter>>,
    failures: &mut Vec<AdapterFailure>,
    provider: &str,
    built: Result<A, AdapterError>,
) {
    match built {
        Ok(adapter) => adapters.push(Arc::new(adapter)),
        Err(e) => {
            error!(provider = provider, error = %e, "Failed to build adapter");
            failures.push(AdapterFailure {
                provider: provider.to_string(),
                error: e.to_string(),
            });
        }
    }
}

/// Hand-entered example listing tagged `manual_entry`
pub fn sample_seed() -> (NormalizedRecord, SourceTag) {
    let hours: BTreeMap<String, String> = [
        ("Monday", "09:00-17:00"),
        ("Tuesday", "09:00-17:00"),
        ("Wednesday", "09:00-17:00"),
        ("Thursday", "09:00-17:00"),
        ("Friday", "09:00-17:00"),
        ("Saturday", "10:00-16:00"),
        ("Sunday", "Closed"),
    ]
    .into_iter()
    .map(|(day, hours)| (day.to_string(), hours.to_string()))
    .collect();

    let record = NormalizedRecord::new("Sample UK Business Ltd", "123 High Street, London, SW1A 1AA")
        .with_coordinates(51.5074, -0.1278)
        .with_category("Restaurant")
        .with_opening_hours(OpeningHours::Schedule(hours))
        .with_rating(4.5)
        .with_price_range(PriceRange::Moderate);

    (record, SourceTag::new(MANUAL_ENTRY_TAG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_key_env() {
        for var in [COMPANIES_HOUSE_KEY_ENV, FOURSQUARE_KEY_ENV, YELP_KEY_ENV] {
            env::remove_var(var);
        }
    }

    fn adapter_names(adapters: &[Arc<dyn SourceAdapter>]) -> Vec<&'static str> {
        adapters.iter().map(|adapter| adapter.name()).collect()
    }

    #[test]
    fn test_sample_seed_is_valid() {
        let (record, tag) = sample_seed();
        assert!(crate::resolution::store::validate(&record).is_ok());
        assert_eq!(tag.as_str(), MANUAL_ENTRY_TAG);
        assert!(matches!(record.opening_hours, Some(OpeningHours::Schedule(ref h)) if h.len() == 7));
    }

    #[test]
    fn test_paths_resolved_from_root() {
        let crawler = Crawler::new(TomlConfig::default(), Path::new("/data/bizdir"));
        assert_eq!(crawler.database_path(), Path::new("/data/bizdir/bizdir.db"));
        assert_eq!(crawler.export_path(), Path::new("/data/bizdir/businesses.json"));
    }

    #[test]
    #[serial]
    fn test_only_openstreetmap_without_keys() {
        clear_key_env();
        let crawler = Crawler::new(TomlConfig::default(), Path::new("/data/bizdir"));

        let (adapters, failures) = crawler.build_adapters();
        assert!(failures.is_empty());
        assert_eq!(adapter_names(&adapters), vec!["osm"]);
    }

    #[test]
    #[serial]
    fn test_keyed_providers_registered() {
        clear_key_env();
        env::set_var(COMPANIES_HOUSE_KEY_ENV, "ch-key");
        env::set_var(FOURSQUARE_KEY_ENV, "fsq-key");
        let mut config = TomlConfig::default();
        config.providers.yelp_api_key = Some("yelp-key".to_string());

        let crawler = Crawler::new(config, Path::new("/data/bizdir"));
        let (adapters, failures) = crawler.build_adapters();
        clear_key_env();

        assert!(failures.is_empty());
        assert_eq!(
            adapter_names(&adapters),
            vec!["companies_house", "osm", "foursquare", "yelp"]
        );
    }
}
