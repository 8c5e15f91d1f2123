//! Integration tests for the SQLite-backed catalogue store.

mod common;

use chrono::{Duration, TimeZone, Utc};

use common::{measure_at, migrated_pool};
use magcat::adapters::sqlite::{catalogue_migrations, Migrator, SqliteMeasureRepository};
use magcat::domain::models::Criteria;
use magcat::domain::ports::MeasureRepository;

#[tokio::test]
async fn migrations_are_idempotent() {
    let pool = migrated_pool().await;

    // A second run applies nothing.
    let applied = Migrator::new(pool.clone())
        .run(catalogue_migrations())
        .await
        .expect("second migration run failed");
    assert_eq!(applied, 0);

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .expect("failed to list tables");
    assert!(tables.contains(&"measures".to_string()));
    assert!(tables.contains(&"schema_migrations".to_string()));
}

#[tokio::test]
async fn insert_and_fetch_round_trip() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);

    let original = measure_at("1001", "ISC", "mb", 6.3, Some(0.2), 0);
    repo.insert(&original).await.expect("insert failed");

    let stored = repo.all().await.expect("fetch failed");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], original);
}

#[tokio::test]
async fn fetch_order_is_stable_by_origin_time() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    let batch = vec![
        measure_at("late", "ISC", "mb", 5.0, None, 7200),
        measure_at("early", "ISC", "mb", 4.0, Some(0.1), 0),
        measure_at("middle", "NEIC", "Ms", 4.5, Some(0.3), 3600),
    ];
    repo.insert_batch(&batch).await.expect("batch insert failed");

    let stored = repo.all().await.expect("fetch failed");
    let keys: Vec<&str> = stored.iter().map(|m| m.event_key.as_str()).collect();
    assert_eq!(keys, vec!["early", "middle", "late"]);
}

#[tokio::test]
async fn matching_applies_criteria() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);
    let batch = vec![
        measure_at("a", "ISC", "mb", 5.0, Some(0.1), 0),
        measure_at("a", "GCMT", "Mw", 5.4, Some(0.1), 10),
        measure_at("b", "ISC", "Ms", 6.0, None, 100_000),
    ];
    repo.insert_batch(&batch).await.expect("batch insert failed");

    let isc = Criteria::with_agencies(["ISC"]);
    assert_eq!(repo.count_matching(&isc).await.unwrap(), 2);

    let cutoff = Utc.timestamp_opt(946_684_800, 0).unwrap() + Duration::seconds(50_000);
    let early_isc = isc.and(Criteria::before(cutoff));
    let matched = repo.matching(&early_isc).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].event_key, "a");

    let events = repo.event_keys_matching(&Criteria::All).await.unwrap();
    assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn summary_reports_extent_of_catalogue() {
    let repo = SqliteMeasureRepository::new(migrated_pool().await);

    let empty = repo.summary().await.expect("summary failed");
    assert_eq!(empty.measure_count, 0);
    assert!(empty.date_range.is_none());

    let batch = vec![
        measure_at("a", "ISC", "mb", 5.0, Some(0.1), 0),
        measure_at("b", "NEIC", "Ms", 6.0, None, 86_400),
    ];
    repo.insert_batch(&batch).await.expect("batch insert failed");

    let summary = repo.summary().await.expect("summary failed");
    assert_eq!(summary.measure_count, 2);
    assert!(summary.agencies.contains("ISC") && summary.agencies.contains("NEIC"));
    assert!(summary.scales.contains("mb") && summary.scales.contains("Ms"));
    let (start, end) = summary.date_range.expect("non-empty catalogue has a range");
    assert_eq!((end - start).num_seconds(), 86_400);
}
