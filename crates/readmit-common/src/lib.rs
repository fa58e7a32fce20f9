//! Readmit Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the readmission workspace.
//!
//! # Overview
//!
//! This crate provides functionality used by both the ETL binary and the
//! HTTP server:
//!
//! - **Error Handling**: Common error type and result alias
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Checksums**: SHA-256 fingerprints of ingested sources
//! - **Environment**: Typed environment-variable lookups with defaults
//!
//! # Example
//!
//! ```no_run
//! use readmit_common::checksum::sha256_file;
//! use readmit_common::Result;
//!
//! fn fingerprint(path: &str) -> Result<()> {
//!     let digest = sha256_file(path)?;
//!     tracing::info!(%digest, "source fingerprint");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{ReadmitError, Result};
