//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;

use magcat::adapters::sqlite::{catalogue_migrations, create_test_pool, Migrator};
use magcat::domain::models::{GeoPoint, MagnitudeMeasure, Origin};

/// An in-memory catalogue database with the schema applied.
pub async fn migrated_pool() -> SqlitePool {
    let pool = create_test_pool().await.expect("failed to create test pool");
    Migrator::new(pool.clone())
        .run(catalogue_migrations())
        .await
        .expect("failed to run migrations");
    pool
}

/// A measure at a fixed epicentre, `offset_secs` after a common epoch.
#[allow(dead_code)]
pub fn measure_at(
    event: &str,
    agency: &str,
    scale: &str,
    value: f64,
    error: Option<f64>,
    offset_secs: i64,
) -> MagnitudeMeasure {
    let origin = Origin::new(
        Utc.timestamp_opt(946_684_800 + offset_secs, 0).unwrap(),
        GeoPoint::new(40.7, 29.9),
    )
    .with_depth(17.0);
    MagnitudeMeasure::new(event, agency, origin, scale, value, error)
}

#[allow(dead_code)]
pub fn measure(
    event: &str,
    agency: &str,
    scale: &str,
    value: f64,
    error: Option<f64>,
) -> MagnitudeMeasure {
    measure_at(event, agency, scale, value, error, 0)
}

/// A small two-agency catalogue with an exact linear relation between the
/// mb and Mw observations of each event.
#[allow(dead_code)]
pub fn linear_catalogue() -> Vec<MagnitudeMeasure> {
    let mut measures = Vec::new();
    for i in 0..6i64 {
        #[allow(clippy::cast_precision_loss)]
        let x = 4.0 + i as f64 * 0.4;
        let offset = i * 3600;
        measures.push(measure_at(
            &format!("ev{i}"),
            "ISC",
            "mb",
            x,
            Some(0.1),
            offset,
        ));
        measures.push(measure_at(
            &format!("ev{i}"),
            "GCMT",
            "Mw",
            0.85 * x + 1.03,
            Some(0.1),
            offset,
        ));
    }
    measures
}
