use crate::domain::errors::DomainResult;
use crate::domain::models::criteria::Criteria;
use crate::domain::models::{CatalogueSummary, MagnitudeMeasure};
use async_trait::async_trait;

/// Repository trait for catalogue storage operations.
///
/// The homogenisation core never talks to a database directly; it consumes
/// this port. Implementations return owned measure records so the pipeline
/// can run stage after stage on an in-memory batch without holding a
/// connection.
#[async_trait]
pub trait MeasureRepository: Send + Sync {
    /// Insert a single measurement record.
    ///
    /// # Errors
    /// Returns an error if the record already exists or the storage
    /// operation fails.
    async fn insert(&self, measure: &MagnitudeMeasure) -> DomainResult<()>;

    /// Insert a batch of measurement records, returning how many were
    /// stored.
    async fn insert_batch(&self, measures: &[MagnitudeMeasure]) -> DomainResult<usize>;

    /// Fetch every stored measurement, ordered by origin time then id.
    async fn all(&self) -> DomainResult<Vec<MagnitudeMeasure>>;

    /// Fetch the measurements satisfying `criteria`, ordered by origin time
    /// then id.
    async fn matching(&self, criteria: &Criteria) -> DomainResult<Vec<MagnitudeMeasure>>;

    /// Count the measurements satisfying `criteria`.
    async fn count_matching(&self, criteria: &Criteria) -> DomainResult<u64>;

    /// Distinct event keys with at least one measurement satisfying
    /// `criteria`, in ascending order.
    async fn event_keys_matching(&self, criteria: &Criteria) -> DomainResult<Vec<String>>;

    /// Aggregate catalogue information: agencies, scales, date range.
    async fn summary(&self) -> DomainResult<CatalogueSummary>;
}
