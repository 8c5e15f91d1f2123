//! Service layer: pipeline orchestration and export.

pub mod export;
pub mod homogeniser;

pub use homogeniser::{Homogeniser, SelectedMeasures, Stage};
