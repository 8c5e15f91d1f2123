//! Domain models for the magcat catalogue.

pub mod config;
pub mod criteria;
pub mod grouping;
pub mod measure;
pub mod regression;
pub mod selection;
pub mod uncertainty;

pub use config::{Config, DatabaseConfig, LoggingConfig, PipelineConfig};
pub use criteria::{Criteria, GeoPolygon};
pub use grouping::{DistanceMetric, GroupKey, Grouper, DEFAULT_CLUSTERING_THRESHOLD_SECONDS};
pub use measure::{
    is_known_scale, CatalogueSummary, ConvertedMeasure, GeoPoint, HomogenisedRecord,
    MagnitudeMeasure, Origin, Provenance, EARTH_RADIUS_KM, KNOWN_SCALES,
};
pub use regression::{FitPair, ModelForm, Prediction, RegressionModel};
pub use selection::MeasureSelector;
pub use uncertainty::MissingUncertaintyPolicy;
