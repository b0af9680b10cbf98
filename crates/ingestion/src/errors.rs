//! Ingestion error types

use skillgraph_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Record {record} is missing required field {field}")]
    MissingField { record: String, field: &'static str },

    #[error("Malformed record {record}: {reason}")]
    Malformed { record: String, reason: String },

    #[error("Activity source error: {0}")]
    Source(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::MissingField { record, field } => AppError::Ingestion {
                record,
                reason: format!("missing {}", field),
            },
            IngestionError::Malformed { record, reason } => AppError::Ingestion { record, reason },
            IngestionError::Source(message) => AppError::Source { message },
            IngestionError::SnapshotNotFound(path) => AppError::NotFound {
                resource_type: "snapshot".to_string(),
                id: path,
            },
            IngestionError::Io(e) => AppError::from(e),
            IngestionError::Serialization(e) => AppError::Serialization(e),
        }
    }
}
