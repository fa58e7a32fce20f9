//! Readmit ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads hospital-admission CSV files into the readmission warehouse table.
//!
//! # Overview
//!
//! Every source goes through the same fixed sequence:
//!
//! - **Extract**: read the CSV, whole-file or in chunks, NA tokens as null
//! - **Normalize**: map the source's columns onto the [`SchemaRegistry`]
//! - **Coerce**: parse timestamps, derive length of stay and the
//!   frequent-flyer flag, fill defaults, count repaired cells
//! - **Load**: append to the warehouse in fixed-size batches
//!
//! [`Pipeline`] runs the sequence for one source; [`BatchRunner`] drives it
//! over an upload directory and routes each file to a processed or failed
//! partition.
//!
//! # Example
//!
//! ```no_run
//! use readmit_etl::{MemoryWarehouse, Pipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(MemoryWarehouse::new()));
//!     let summary = pipeline.run_file("uploads/admissions.csv".as_ref()).await?;
//!     tracing::info!(rows = summary.rows_loaded, "loaded");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod coerce;
pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod table;

// Re-export commonly used types
pub use batch::{BatchDirs, BatchReport, BatchRunner, FileOutcome, FileReport};
pub use coerce::{CellOutcome, CoercionReport, TypeCoercer};
pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use extract::{ExtractMode, Extractor};
pub use load::{Loader, MemoryWarehouse, PgWarehouse, Warehouse};
pub use normalize::{ColumnMapping, ColumnNormalizer};
pub use pipeline::{LoadSummary, Pipeline, PipelineConfig};
pub use schema::{ColumnKind, ColumnSpec, SchemaRegistry};
pub use table::{Table, Value};
