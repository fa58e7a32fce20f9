//! Error types for the readmission ETL pipeline
//!
//! Only whole-file problems are errors. Individual cells that are missing or
//! malformed are repaired by the coercer and tallied in its report instead.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// The source could not be read or is not a well-formed CSV table
    #[error("Failed to extract {source_name}: {reason}")]
    Extraction { source_name: String, reason: String },

    /// None of the source's columns belong to the schema
    #[error("{source_name} has no columns in common with the readmission schema")]
    SchemaMismatch { source_name: String },

    /// A batch insert failed; earlier batches stay committed
    #[error(
        "Load into {destination} failed at batch {batch} ({committed_rows} rows already committed): {cause}"
    )]
    Load {
        destination: String,
        batch: usize,
        committed_rows: u64,
        #[source]
        cause: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] readmit_common::ReadmitError),
}

impl EtlError {
    pub fn extraction(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            EtlError::Extraction { .. } => "EXTRACTION_ERROR",
            EtlError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            EtlError::Load { .. } => "LOAD_ERROR",
            EtlError::Io(_) => "IO_ERROR",
            EtlError::Config(_) | EtlError::Common(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_message_names_batch_and_progress() {
        let err = EtlError::Load {
            destination: "readmission".to_string(),
            batch: 2,
            committed_rows: 2000,
            cause: anyhow::anyhow!("connection reset"),
        };

        let message = err.to_string();
        assert!(message.contains("readmission"));
        assert!(message.contains("batch 2"));
        assert!(message.contains("2000 rows"));
        assert!(message.contains("connection reset"));
        assert_eq!(err.code(), "LOAD_ERROR");
    }

    #[test]
    fn test_schema_mismatch_names_source() {
        let err = EtlError::SchemaMismatch {
            source_name: "weather.csv".to_string(),
        };
        assert!(err.to_string().starts_with("weather.csv"));
    }
}
