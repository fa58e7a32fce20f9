// Pipeline orchestration for one source
//
// Runs extract -> normalize -> coerce -> load in that order and times each
// stage. The same `Pipeline` serves the batch runner, the single-file CLI
// command and the HTTP upload endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use readmit_common::checksum::{sha256_bytes, sha256_file};

use crate::coerce::{CoercionReport, TypeCoercer};
use crate::error::{EtlError, Result};
use crate::extract::{ExtractMode, Extractor};
use crate::load::{Loader, Warehouse, DEFAULT_BATCH_SIZE};
use crate::normalize::ColumnNormalizer;
use crate::schema::SchemaRegistry;

/// Default destination table
pub const DEFAULT_DESTINATION: &str = "readmission";

/// Everything a pipeline run needs to know, passed explicitly
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub registry: SchemaRegistry,
    pub destination: String,
    pub batch_size: usize,
    pub extract_mode: ExtractMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            registry: SchemaRegistry::readmission(),
            destination: DEFAULT_DESTINATION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            extract_mode: ExtractMode::WholeFile,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_extract_mode(mut self, mode: ExtractMode) -> Self {
        self.extract_mode = mode;
        self
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub extract_ms: u64,
    pub transform_ms: u64,
    pub load_ms: u64,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Result of one successful run
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub source_name: String,
    /// SHA-256 of the raw source, for spotting resubmitted files
    pub checksum: String,
    pub rows_extracted: usize,
    pub rows_loaded: u64,
    pub batches: usize,
    pub coercion: CoercionReport,
    pub timings: StageTimings,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Pipeline {
    config: PipelineConfig,
    loader: Loader,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, warehouse: Arc<dyn Warehouse>) -> Self {
        let loader = Loader::new(warehouse, config.batch_size);
        Self { config, loader }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over a file on disk
    ///
    /// The file is streamed; in chunked mode at most one chunk plus one
    /// batch of rows is held in memory.
    pub async fn run_file(&self, path: &Path) -> Result<LoadSummary> {
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let owned = path.to_path_buf();
        let checksum = tokio::task::spawn_blocking(move || sha256_file(owned))
            .await
            .map_err(|e| EtlError::extraction(&source_name, e))?
            .map_err(|e| EtlError::extraction(&source_name, e))?;

        let file = File::open(path).map_err(|e| EtlError::extraction(&source_name, e))?;
        self.run_reader(&source_name, checksum, BufReader::new(file))
            .await
    }

    /// Run the pipeline over an in-memory source, e.g. an uploaded file
    pub async fn run_bytes(&self, source_name: &str, bytes: &[u8]) -> Result<LoadSummary> {
        self.run_reader(source_name, sha256_bytes(bytes), bytes)
            .await
    }

    /// Run the pipeline over any readable source
    ///
    /// The header is checked against the registry before any row is read.
    /// Each chunk is normalized, coerced and handed to the loader as it is
    /// read, and the loader writes every batch as soon as it fills. In
    /// whole-file mode the single chunk is the whole source, so a malformed
    /// row fails the file before anything is written.
    pub async fn run_reader<R: Read + Send>(
        &self,
        source_name: &str,
        checksum: String,
        reader: R,
    ) -> Result<LoadSummary> {
        let started_at = Utc::now();
        let registry = &self.config.registry;
        let normalizer = ColumnNormalizer::new(registry);
        let coercer = TypeCoercer::new(registry);

        info!(source = %source_name, checksum = %checksum, "starting pipeline");

        let mut extract_time = Duration::ZERO;
        let mut transform_time = Duration::ZERO;
        let mut load_time = Duration::ZERO;

        let start = Instant::now();
        let mut chunks = Extractor::new(self.config.extract_mode).open(source_name, reader)?;
        extract_time += start.elapsed();

        let start = Instant::now();
        let mapping = normalizer.plan(source_name, chunks.headers())?;
        transform_time += start.elapsed();

        let mut session = self.loader.begin(&self.config.destination, registry)?;
        let mut coercion = CoercionReport::default();
        let mut rows_extracted = 0;

        loop {
            let start = Instant::now();
            let next = chunks.next();
            extract_time += start.elapsed();

            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    if session.committed_rows() > 0 {
                        warn!(
                            source = %source_name,
                            committed_rows = session.committed_rows(),
                            "source became unreadable after rows were committed"
                        );
                    }
                    return Err(e);
                },
            };
            rows_extracted += chunk.len();

            let start = Instant::now();
            let (coerced, chunk_report) = coercer.coerce(mapping.apply(&chunk));
            coercion.merge(chunk_report);
            transform_time += start.elapsed();

            let start = Instant::now();
            session.push(coerced.into_rows()).await?;
            load_time += start.elapsed();
        }

        let start = Instant::now();
        let load = session.finish().await?;
        load_time += start.elapsed();

        let summary = LoadSummary {
            source_name: source_name.to_string(),
            checksum,
            rows_extracted,
            rows_loaded: load.rows_loaded,
            batches: load.batches,
            coercion,
            timings: StageTimings {
                extract_ms: millis(extract_time),
                transform_ms: millis(transform_time),
                load_ms: millis(load_time),
            },
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            source = %summary.source_name,
            rows = summary.rows_loaded,
            batches = summary.batches,
            found = mapping.found().len(),
            filled = summary.coercion.filled_cells,
            defaulted = summary.coercion.defaulted_cells,
            extract_ms = summary.timings.extract_ms,
            transform_ms = summary.timings.transform_ms,
            load_ms = summary.timings.load_ms,
            "pipeline complete"
        );

        Ok(summary)
    }
}
