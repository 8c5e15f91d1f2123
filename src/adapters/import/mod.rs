//! Bulletin importers.

pub mod iaspei;
pub mod isf;

pub use iaspei::{IaspeiImporter, ImportSummary};
pub use isf::IsfImporter;
