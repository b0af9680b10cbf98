//! Skillgraph Common Library
//!
//! Shared code for all Skillgraph crates including:
//! - Heterogeneous information network (graph store and export)
//! - Error types and handling
//! - Configuration management
//! - Scoring oracle abstraction
//! - Text normalisation (tokenizer and stop list)
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod graph;
pub mod metrics;
pub mod oracle;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use graph::{GraphStore, NodeId, NodeKind};
pub use oracle::ScoringOracle;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
