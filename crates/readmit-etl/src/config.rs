//! Configuration for the ETL binary
//!
//! Values come from the environment (after `.env` is loaded), with the
//! defaults below. Command-line flags override them in `main`.

use readmit_common::env::{env_optional, env_or, env_string_or};
use std::path::PathBuf;

use crate::batch::{BatchDirs, DEFAULT_FAILED_DIR, DEFAULT_PROCESSED_DIR, DEFAULT_UPLOAD_DIR};
use crate::error::{EtlError, Result};
use crate::extract::{ExtractMode, DEFAULT_CHUNK_SIZE};
use crate::load::{check_batch_params, validate_destination, DEFAULT_BATCH_SIZE};
use crate::pipeline::{PipelineConfig, DEFAULT_DESTINATION};
use crate::schema::SchemaRegistry;

/// Default maximum connections for the ETL's pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Connection string; only required when actually loading
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub destination: String,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub chunked: bool,
    pub dirs: BatchDirs,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            destination: DEFAULT_DESTINATION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunked: false,
            dirs: BatchDirs::default(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from environment variables
    ///
    /// - `DATABASE_URL`
    /// - `ETL_MAX_CONNECTIONS` (default 4)
    /// - `ETL_DESTINATION_TABLE` (default `readmission`)
    /// - `ETL_BATCH_SIZE` (default 1000)
    /// - `ETL_CHUNK_SIZE` (default 25)
    /// - `ETL_CHUNKED` (default false)
    /// - `ETL_UPLOAD_DIR`, `ETL_PROCESSED_DIR`, `ETL_FAILED_DIR`
    pub fn from_env() -> Self {
        Self {
            database_url: env_optional("DATABASE_URL"),
            max_connections: env_or("ETL_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            destination: env_string_or("ETL_DESTINATION_TABLE", DEFAULT_DESTINATION),
            batch_size: env_or("ETL_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            chunk_size: env_or("ETL_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            chunked: env_or("ETL_CHUNKED", false),
            dirs: BatchDirs {
                upload: PathBuf::from(env_string_or("ETL_UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
                processed: PathBuf::from(env_string_or("ETL_PROCESSED_DIR", DEFAULT_PROCESSED_DIR)),
                failed: PathBuf::from(env_string_or("ETL_FAILED_DIR", DEFAULT_FAILED_DIR)),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_destination(&self.destination)?;

        if self.batch_size == 0 {
            return Err(EtlError::config("batch size must be greater than 0"));
        }

        check_batch_params(self.batch_size, SchemaRegistry::readmission().len())?;

        if self.chunk_size == 0 {
            return Err(EtlError::config("chunk size must be greater than 0"));
        }

        if self.max_connections == 0 {
            return Err(EtlError::config("max connections must be greater than 0"));
        }

        Ok(())
    }

    pub fn extract_mode(&self) -> ExtractMode {
        if self.chunked {
            ExtractMode::Chunked {
                chunk_size: self.chunk_size,
            }
        } else {
            ExtractMode::WholeFile
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_destination(self.destination.clone())
            .with_batch_size(self.batch_size)
            .with_extract_mode(self.extract_mode())
    }

    /// Connection string, required for anything that touches the warehouse
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| EtlError::config("DATABASE_URL not set"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "ETL_MAX_CONNECTIONS",
        "ETL_DESTINATION_TABLE",
        "ETL_BATCH_SIZE",
        "ETL_CHUNK_SIZE",
        "ETL_CHUNKED",
        "ETL_UPLOAD_DIR",
        "ETL_PROCESSED_DIR",
        "ETL_FAILED_DIR",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = EtlConfig::from_env();

        assert_eq!(config.destination, "readmission");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.chunk_size, 25);
        assert_eq!(config.extract_mode(), ExtractMode::WholeFile);
        assert_eq!(config.dirs, BatchDirs::default());
        assert!(config.validate().is_ok());
        assert!(config.require_database_url().is_err());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear();
        std::env::set_var("ETL_DESTINATION_TABLE", "staging.readmission");
        std::env::set_var("ETL_BATCH_SIZE", "500");
        std::env::set_var("ETL_CHUNKED", "true");
        std::env::set_var("ETL_CHUNK_SIZE", "10");
        std::env::set_var("ETL_FAILED_DIR", "/tmp/rejects");

        let config = EtlConfig::from_env();
        clear();

        assert_eq!(config.destination, "staging.readmission");
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.extract_mode(), ExtractMode::Chunked { chunk_size: 10 });
        assert_eq!(config.dirs.failed, PathBuf::from("/tmp/rejects"));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.batch_size, 500);
        assert_eq!(pipeline.destination, "staging.readmission");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EtlConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 3000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at most 2520 rows"));

        config.batch_size = usize::MAX;
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));

        config.batch_size = 1000;
        config.destination = "bad name".to_string();
        assert!(config.validate().is_err());
    }
}
