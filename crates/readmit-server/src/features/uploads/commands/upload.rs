//! Upload CSV command
//!
//! Runs an uploaded admissions file through the same pipeline the batch CLI
//! uses and reports the outcome.

use readmit_etl::{EtlError, LoadSummary, Pipeline};
use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;

/// An uploaded file, as read from the multipart body
#[derive(Debug, Clone)]
pub struct UploadCsvCommand {
    /// Client-side file name, used as the source name in logs
    pub file_name: Option<String>,
    pub content: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadCsvResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: LoadSummary,
}

#[derive(Debug, Error)]
pub enum UploadCsvError {
    #[error("No csv_file field found in multipart data")]
    FileRequired,

    #[error("Uploaded file '{0}' is empty")]
    EmptyFile(String),

    #[error(transparent)]
    Pipeline(#[from] EtlError),
}

impl From<UploadCsvError> for AppError {
    fn from(err: UploadCsvError) -> Self {
        match err {
            UploadCsvError::FileRequired | UploadCsvError::EmptyFile(_) => {
                AppError::Validation(err.to_string())
            },
            UploadCsvError::Pipeline(e) => AppError::Pipeline(e),
        }
    }
}

pub const DEFAULT_SOURCE_NAME: &str = "upload.csv";

impl UploadCsvCommand {
    pub fn source_name(&self) -> &str {
        self.file_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_SOURCE_NAME)
    }

    pub fn validate(&self) -> Result<&[u8], UploadCsvError> {
        let content = self.content.as_deref().ok_or(UploadCsvError::FileRequired)?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(UploadCsvError::EmptyFile(self.source_name().to_string()));
        }
        Ok(content)
    }
}

#[tracing::instrument(skip(pipeline, command), fields(source = %command.source_name()))]
pub async fn handle(
    pipeline: &Pipeline,
    command: UploadCsvCommand,
) -> Result<UploadCsvResponse, UploadCsvError> {
    let content = command.validate()?;
    let summary = pipeline.run_bytes(command.source_name(), content).await?;

    Ok(UploadCsvResponse {
        message: format!("Successfully uploaded {} rows", summary.rows_loaded),
        summary,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use readmit_etl::{MemoryWarehouse, PipelineConfig};
    use std::sync::Arc;

    fn command(content: Option<&str>) -> UploadCsvCommand {
        UploadCsvCommand {
            file_name: Some("admissions.csv".to_string()),
            content: content.map(|c| c.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_validation() {
        assert!(matches!(command(None).validate(), Err(UploadCsvError::FileRequired)));
        assert!(matches!(command(Some(" \n")).validate(), Err(UploadCsvError::EmptyFile(_))));
        assert!(command(Some("SUBJECT_ID\n1\n")).validate().is_ok());
    }

    #[test]
    fn test_source_name_defaults() {
        let mut cmd = command(None);
        assert_eq!(cmd.source_name(), "admissions.csv");
        cmd.file_name = Some("  ".to_string());
        assert_eq!(cmd.source_name(), DEFAULT_SOURCE_NAME);
        cmd.file_name = None;
        assert_eq!(cmd.source_name(), DEFAULT_SOURCE_NAME);
    }

    #[tokio::test]
    async fn test_handle_loads_rows() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let pipeline = Pipeline::new(PipelineConfig::default(), warehouse.clone());

        let response = handle(&pipeline, command(Some("SUBJECT_ID,AGE\n1,70\n2,45\n")))
            .await
            .unwrap();

        assert_eq!(response.summary.rows_loaded, 2);
        assert_eq!(response.message, "Successfully uploaded 2 rows");
        assert_eq!(warehouse.row_count(), 2);
    }

    #[tokio::test]
    async fn test_handle_rejects_foreign_schema() {
        let warehouse = Arc::new(MemoryWarehouse::new());
        let pipeline = Pipeline::new(PipelineConfig::default(), warehouse.clone());

        let err = handle(&pipeline, command(Some("city,temperature\nOslo,3\n")))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadCsvError::Pipeline(EtlError::SchemaMismatch { .. })));
        assert_eq!(warehouse.row_count(), 0);
    }
}
