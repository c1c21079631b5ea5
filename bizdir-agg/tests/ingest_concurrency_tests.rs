//! Integration tests for concurrent ingest
//!
//! Several producer tasks share one ingest service; every command must be
//! applied atomically, so the final store matches a sequential replay.

use bizdir_agg::ingest::IngestService;
use bizdir_agg::resolution::{AggregationStore, IngestOutcome};
use bizdir_agg::types::{NormalizedRecord, SourceTag};
use bizdir_agg::IngestError;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_concurrent_producers_merge_shared_identities() {
    let service = IngestService::spawn(AggregationStore::new(), 4);
    let mut join_set = JoinSet::new();

    // 8 producers, each reporting the same 20 businesses
    for producer in 0..8 {
        let handle = service.handle();
        join_set.spawn(async move {
            for i in 0..20 {
                let record = NormalizedRecord::new(format!("Shop {}", i), format!("{} Station Road", i))
                    .with_coordinates(52.0 + i as f64 * 0.01, -1.0)
                    .with_rating(4.0);
                handle
                    .submit(record, SourceTag::new(format!("osm_{}_{}", producer, i)))
                    .await
                    .unwrap_or_else(|e| panic!("Producer {} failed: {}", producer, e));
            }
        });
    }

    while let Some(result) = join_set.join_next().await {
        result.unwrap();
    }

    let store = service.finish().await.unwrap();
    assert_eq!(store.len(), 20);

    let stats = store.stats();
    assert_eq!(stats.created, 20);
    assert_eq!(stats.merged, 8 * 20 - 20);

    for record in store.all_records() {
        assert_eq!(record.provenance.len(), 8);
        assert_eq!(record.business.average_rating, Some(4.0));
    }
}

#[tokio::test]
async fn test_replacement_is_atomic_under_concurrency() {
    let service = IngestService::spawn(AggregationStore::new(), 1);

    let registry = service.handle();
    registry
        .submit(
            NormalizedRecord::new("Acme Ltd", "1 High Street").with_coordinates(51.5, -0.1),
            SourceTag::new("companies_house_1"),
        )
        .await
        .unwrap();

    let mut join_set = JoinSet::new();
    for (name, tag) in [("Acme Café", "osm_1"), ("Acme Coffee", "yelp_1")] {
        let handle = service.handle();
        join_set.spawn(async move {
            handle
                .submit(
                    NormalizedRecord::new(name, "1 High Street").with_coordinates(51.5, -0.1),
                    SourceTag::new(tag),
                )
                .await
                .unwrap()
        });
    }

    let mut outcomes = Vec::new();
    while let Some(result) = join_set.join_next().await {
        outcomes.push(result.unwrap());
    }

    // Exactly one open record displaces the registry entry; the other
    // finds an open-tier occupant and is created alongside it
    let replaced = outcomes
        .iter()
        .filter(|o| matches!(o, IngestOutcome::Replaced { .. }))
        .count();
    assert_eq!(replaced, 1);
    assert!(outcomes.contains(&IngestOutcome::Created));

    drop(registry);
    let store = service.finish().await.unwrap();
    assert_eq!(store.len(), 2);
    assert!(store.all_records().all(|r| r.business.name != "Acme Ltd"));
}

#[tokio::test]
async fn test_finish_waits_for_outstanding_handles() {
    let service = IngestService::spawn(AggregationStore::new(), 4);
    let handle = service.handle();

    let finisher = tokio::spawn(service.finish());
    handle
        .submit(NormalizedRecord::new("Acme", "1 High Street"), SourceTag::new("osm_1"))
        .await
        .unwrap();
    drop(handle);

    let store = finisher.await.unwrap().unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_rejections_do_not_stop_other_producers() {
    let service = IngestService::spawn(AggregationStore::new(), 4);

    let bad = service.handle();
    let good = service.handle();

    let bad_task = tokio::spawn(async move {
        let mut rejected = 0;
        for i in 0..5 {
            let result = bad
                .submit(NormalizedRecord::new("", "1 High Street"), SourceTag::new(format!("yelp_{}", i)))
                .await;
            if matches!(result, Err(IngestError::Validation(_))) {
                rejected += 1;
            }
        }
        rejected
    });

    let good_task = tokio::spawn(async move {
        for i in 0..5 {
            good.submit(
                NormalizedRecord::new(format!("Cafe {}", i), "1 High Street"),
                SourceTag::new(format!("osm_{}", i)),
            )
            .await
            .unwrap();
        }
    });

    assert_eq!(bad_task.await.unwrap(), 5);
    good_task.await.unwrap();

    let store = service.finish().await.unwrap();
    assert_eq!(store.len(), 5);
    assert_eq!(store.stats().rejected, 5);
}
