use crate::domain::errors::DomainResult;
use crate::domain::models::regression::RegressionModel;
use crate::domain::models::MagnitudeMeasure;
use std::path::Path;

/// Port for the plot-rendering collaborator.
///
/// The homogeniser hands over the selected native/target measure pairs and
/// the active model list; rendering success or failure never affects
/// pipeline state.
pub trait MeasurePlotter: Send + Sync {
    /// Render a scatter of selected pairs with the fitted models overlaid.
    fn plot(
        &self,
        native: &[MagnitudeMeasure],
        target: &[MagnitudeMeasure],
        models: &[RegressionModel],
        destination: &Path,
    ) -> DomainResult<()>;
}

/// Plotter that renders nothing. Used when no rendering backend is wired
/// in, e.g. headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlotter;

impl MeasurePlotter for NullPlotter {
    fn plot(
        &self,
        native: &[MagnitudeMeasure],
        _target: &[MagnitudeMeasure],
        _models: &[RegressionModel],
        destination: &Path,
    ) -> DomainResult<()> {
        tracing::debug!(
            pairs = native.len(),
            destination = %destination.display(),
            "null plotter invoked, nothing rendered"
        );
        Ok(())
    }
}
