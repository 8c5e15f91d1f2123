//! Magcat - Earthquake Magnitude Homogenisation Toolkit
//!
//! Magcat stores heterogeneous magnitude measures in a catalogue and
//! converts them to a common target scale through empirical regression
//! models fitted on co-located observations.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure pipeline components and domain models
//! - **Service Layer** (`services`): Pipeline orchestration and export
//! - **Adapters** (`adapters`): Storage and bulletin import implementations
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use magcat::services::Homogeniser;
//! use magcat::domain::models::ModelForm;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut homogeniser = Homogeniser::new(repo);
//!     homogeniser.set_scales("mb", "Mw");
//!     homogeniser.fit_model(ModelForm::Linear).await?;
//!     let records = homogeniser.homogenised_measures().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CatalogueSummary, Config, ConvertedMeasure, Criteria, DatabaseConfig, DistanceMetric,
    GeoPoint, GeoPolygon, GroupKey, Grouper, HomogenisedRecord, LoggingConfig, MagnitudeMeasure,
    MeasureSelector, MissingUncertaintyPolicy, ModelForm, Origin, PipelineConfig, Prediction,
    Provenance, RegressionModel,
};
pub use domain::ports::{MeasurePlotter, MeasureRepository, NullPlotter};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::Homogeniser;
