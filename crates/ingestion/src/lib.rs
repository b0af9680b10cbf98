//! Skillgraph Ingestion
//!
//! From raw developer activity to a weighted HIN:
//! - `source`: where activity comes from (GitHub, snapshot files)
//! - `records`: the raw record shapes
//! - `weighter`: tokenization, TF-IDF and edge weights
//! - `builder`: graph construction with skip-and-count error handling

pub mod builder;
pub mod errors;
pub mod records;
pub mod source;
pub mod weighter;

pub use builder::{HinBuilder, IngestionReport};
pub use errors::IngestionError;
pub use records::ActivitySnapshot;
pub use source::{create_source, ActivitySource};
