//! In-memory implementation of the measure repository.
//!
//! Backs tests and batch runs that never touch disk: the import stage can
//! feed measures straight into a pipeline without a database file.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockWriteGuard};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CatalogueSummary, Criteria, MagnitudeMeasure};
use crate::domain::ports::MeasureRepository;

#[derive(Debug, Default)]
pub struct InMemoryMeasureRepository {
    measures: RwLock<Vec<MagnitudeMeasure>>,
}

impl InMemoryMeasureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous insert for fixtures; panics on a poisoned lock. The
    /// repository trait methods report that condition as a storage error
    /// instead.
    pub fn push(&self, measure: MagnitudeMeasure) {
        self.try_push(measure).expect("measure store lock poisoned");
    }

    fn try_push(&self, measure: MagnitudeMeasure) -> DomainResult<()> {
        self.store()?.push(measure);
        Ok(())
    }

    fn store(&self) -> DomainResult<RwLockWriteGuard<'_, Vec<MagnitudeMeasure>>> {
        self.measures
            .write()
            .map_err(|_| DomainError::Storage("measure store lock poisoned".to_string()))
    }

    fn snapshot(&self) -> DomainResult<Vec<MagnitudeMeasure>> {
        let mut measures = self
            .measures
            .read()
            .map_err(|_| DomainError::Storage("measure store lock poisoned".to_string()))?
            .clone();
        measures.sort_by(|a, b| {
            a.origin
                .time
                .cmp(&b.origin.time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(measures)
    }
}

#[async_trait]
impl MeasureRepository for InMemoryMeasureRepository {
    async fn insert(&self, measure: &MagnitudeMeasure) -> DomainResult<()> {
        self.try_push(measure.clone())
    }

    async fn insert_batch(&self, measures: &[MagnitudeMeasure]) -> DomainResult<usize> {
        let mut store = self.store()?;
        store.extend(measures.iter().cloned());
        Ok(measures.len())
    }

    async fn all(&self) -> DomainResult<Vec<MagnitudeMeasure>> {
        self.snapshot()
    }

    async fn matching(&self, criteria: &Criteria) -> DomainResult<Vec<MagnitudeMeasure>> {
        Ok(self
            .snapshot()?
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
        let measures = self.snapshot()?;
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
