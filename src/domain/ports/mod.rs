//! Ports: trait boundaries the core consumes.

pub mod measure_repository;
pub mod plotter;

pub use measure_repository::MeasureRepository;
pub use plotter::{MeasurePlotter, NullPlotter};
