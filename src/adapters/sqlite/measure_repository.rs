//! SQLite implementation of the [`MeasureRepository`] port.
//!
//! Rows are fetched ordered by origin time and filtered in Rust with
//! [`Criteria::matches`], so geographic predicates behave identically on
//! every backend. The catalogues this tool targets are batch-sized; the
//! predicate never needs to be pushed into SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CatalogueSummary, Criteria, GeoPoint, MagnitudeMeasure, Origin,
};
use crate::domain::ports::MeasureRepository;

#[derive(Clone)]
pub struct SqliteMeasureRepository {
    pool: SqlitePool,
}

impl SqliteMeasureRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn measure_from_row(row: &SqliteRow) -> DomainResult<MagnitudeMeasure> {
        let id: String = row.try_get("id")?;
        let origin_time: String = row.try_get("origin_time")?;
        let time = DateTime::parse_from_rfc3339(&origin_time)
            .map_err(|e| DomainError::Storage(format!("bad origin_time '{origin_time}': {e}")))?
            .with_timezone(&Utc);

        Ok(MagnitudeMeasure {
            id: Uuid::from_str(&id)
                .map_err(|e| DomainError::Storage(format!("bad measure id '{id}': {e}")))?,
            event_key: row.try_get("event_key")?,
            agency: row.try_get("agency")?,
            origin: Origin {
                time,
                position: GeoPoint {
                    lat_deg: row.try_get("lat_deg")?,
                    lon_deg: row.try_get("lon_deg")?,
                },
                depth_km: row.try_get("depth_km")?,
            },
            scale: row.try_get("scale")?,
            value: row.try_get("value")?,
            standard_error: row.try_get("standard_error")?,
        })
    }

    async fn fetch_all(&self) -> DomainResult<Vec<MagnitudeMeasure>> {
        let rows = sqlx::query("SELECT * FROM measures ORDER BY origin_time, id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::measure_from_row).collect()
    }
}

#[async_trait]
impl MeasureRepository for SqliteMeasureRepository {
    async fn insert(&self, measure: &MagnitudeMeasure) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO measures
              (id, event_key, agency, scale, value, standard_error,
               origin_time, lat_deg, lon_deg, depth_km)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(measure.id.to_string())
        .bind(&measure.event_key)
        .bind(&measure.agency)
        .bind(&measure.scale)
        .bind(measure.value)
        .bind(measure.standard_error)
        .bind(measure.origin.time.to_rfc3339())
        .bind(measure.origin.position.lat_deg)
        .bind(measure.origin.position.lon_deg)
        .bind(measure.origin.depth_km)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_batch(&self, measures: &[MagnitudeMeasure]) -> DomainResult<usize> {
        let mut tx = self.pool.begin().await?;
        for measure in measures {
            sqlx::query(
                r"INSERT INTO measures
                  (id, event_key, agency, scale, value, standard_error,
                   origin_time, lat_deg, lon_deg, depth_km)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(measure.id.to_string())
            .bind(&measure.event_key)
            .bind(&measure.agency)
            .bind(&measure.scale)
            .bind(measure.value)
            .bind(measure.standard_error)
            .bind(measure.origin.time.to_rfc3339())
            .bind(measure.origin.position.lat_deg)
            .bind(measure.origin.position.lon_deg)
            .bind(measure.origin.depth_km)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(measures.len())
    }

    async fn all(&self) -> DomainResult<Vec<MagnitudeMeasure>> {
        self.fetch_all().await
    }

    async fn matching(&self, criteria: &Criteria) -> DomainResult<Vec<MagnitudeMeasure>> {
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter(|m| criteria.matches(m))
            .collect())
    }

    async fn count_matching(&self, criteria: &Criteria) -> DomainResult<u64> {
        Ok(self.matching(criteria).await?.len() as u64)
    }

    async fn event_keys_matching(&self, criteria: &Criteria) -> DomainResult<Vec<String>> {
        let keys: BTreeSet<String> = self
            .matching(criteria)
            .await?
            .into_iter()
            .map(|m| m.event_key)
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn summary(&self) -> DomainResult<CatalogueSummary> {
        let measures = self.fetch_all().await?;
        let date_range = match (measures.first(), measures.last()) {
            (Some(first), Some(last)) => Some((first.origin.time, last.origin.time)),
            _ => None,
        };
        Ok(CatalogueSummary {
            measure_count: measures.len() as u64,
            agencies: measures.iter().map(|m| m.agency.clone()).collect(),
            scales: measures.iter().map(|m| m.scale.clone()).collect(),
            date_range,
        })
    }
}
