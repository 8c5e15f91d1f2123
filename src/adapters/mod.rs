//! Adapters: concrete implementations of the domain ports.

pub mod import;
pub mod memory;
pub mod sqlite;

pub use memory::InMemoryMeasureRepository;
pub use sqlite::SqliteMeasureRepository;
