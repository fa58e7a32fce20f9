// Warehouse loading
//
// Appends a coerced table to the destination in fixed-size batches, one
// multi-row INSERT per batch. Batches commit independently: when one fails
// the error reports how many rows are already in the warehouse, and nothing
// is rolled back.

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use crate::error::{EtlError, Result};
use crate::schema::{ColumnKind, ColumnSpec, SchemaRegistry};
use crate::table::{Table, Value};

/// Rows per INSERT statement
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// PostgreSQL's limit on bind parameters in one statement
pub const MAX_BIND_PARAMS: usize = 65_535;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$";

/// Check that a destination name is a plain (optionally schema-qualified)
/// SQL identifier, since it is spliced into the statement text
pub fn validate_destination(name: &str) -> Result<()> {
    let pattern = Regex::new(IDENTIFIER_PATTERN)
        .map_err(|e| EtlError::config(format!("invalid identifier pattern: {}", e)))?;

    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(EtlError::config(format!(
            "'{}' is not a valid destination table name",
            name
        )))
    }
}

/// Append-only sink for coerced rows
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Insert one batch as a single statement, returning the rows written
    async fn insert_batch(
        &self,
        destination: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<Value>],
    ) -> anyhow::Result<u64>;
}

/// PostgreSQL warehouse
#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn insert_batch(
        &self,
        destination: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<Value>],
    ) -> anyhow::Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let column_list = columns
            .iter()
            .map(ColumnSpec::sql_name)
            .collect::<Vec<_>>()
            .join(", ");

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", destination, column_list));

        query_builder.push_values(rows.iter(), |mut b, row| {
            for (spec, value) in columns.iter().zip(row) {
                match spec.kind {
                    ColumnKind::Identifier | ColumnKind::Count | ColumnKind::Timestamp => {
                        b.push_bind(value.as_i64());
                    },
                    ColumnKind::Flag | ColumnKind::Target => {
                        b.push_bind(value.as_bool());
                    },
                    ColumnKind::Hours => {
                        b.push_bind(value.as_f64());
                    },
                    ColumnKind::Text => {
                        b.push_bind(value.to_text());
                    },
                }
            }
        });

        let result = query_builder
            .build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert {} rows into {}", rows.len(), destination))?;

        Ok(result.rows_affected())
    }
}

/// A batch captured by [`MemoryWarehouse`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedBatch {
    pub destination: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Warehouse that keeps batches in memory
///
/// Used for dry runs and tests. Can be told to fail on a given batch.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    batches: Mutex<Vec<RecordedBatch>>,
    fail_on_batch: Option<usize>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th insert (0-based) and every one after it
    pub fn failing_from(n: usize) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail_on_batch: Some(n),
        }
    }

    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(|b| b.rows.len()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.batch_sizes().iter().sum()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn insert_batch(
        &self,
        destination: &str,
        columns: &[ColumnSpec],
        rows: &[Vec<Value>],
    ) -> anyhow::Result<u64> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| anyhow::anyhow!("memory warehouse lock poisoned"))?;

        if let Some(n) = self.fail_on_batch {
            if batches.len() >= n {
                anyhow::bail!("simulated failure inserting into {}", destination);
            }
        }

        batches.push(RecordedBatch {
            destination: destination.to_string(),
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            rows: rows.to_vec(),
        });

        Ok(rows.len() as u64)
    }
}

/// Outcome of a successful load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_loaded: u64,
    pub batches: usize,
}

/// Check that `batch_size` rows of `width` columns fit in one statement
pub fn check_batch_params(batch_size: usize, width: usize) -> Result<()> {
    match batch_size.checked_mul(width) {
        Some(params) if params <= MAX_BIND_PARAMS => Ok(()),
        _ => Err(EtlError::config(format!(
            "batch size {} is too large; at most {} rows of {} columns fit in one statement",
            batch_size,
            MAX_BIND_PARAMS / width.max(1),
            width
        ))),
    }
}

/// Splits rows into batches and hands them to a warehouse
#[derive(Clone)]
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
    batch_size: usize,
}

impl Loader {
    pub fn new(warehouse: Arc<dyn Warehouse>, batch_size: usize) -> Self {
        Self {
            warehouse,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Start an incremental load into `destination`
    pub fn begin<'a>(
        &'a self,
        destination: &str,
        registry: &'a SchemaRegistry,
    ) -> Result<LoadSession<'a>> {
        validate_destination(destination)?;
        check_batch_params(self.batch_size, registry.len())?;

        Ok(LoadSession {
            loader: self,
            destination: destination.to_string(),
            columns: registry.columns(),
            pending: Vec::new(),
            report: LoadReport::default(),
        })
    }

    /// Append every row of `table` to `destination`
    pub async fn load(
        &self,
        destination: &str,
        registry: &SchemaRegistry,
        table: &Table,
    ) -> Result<LoadReport> {
        let mut session = self.begin(destination, registry)?;
        for rows in table.rows().chunks(self.batch_size) {
            session.write(rows).await?;
        }
        session.finish().await
    }
}

/// One load in progress
///
/// Rows are buffered until a full batch is available. Batch numbering and
/// the committed-row count run across every push, so a failure reports the
/// same position whether the rows arrived at once or in chunks.
pub struct LoadSession<'a> {
    loader: &'a Loader,
    destination: String,
    columns: &'a [ColumnSpec],
    pending: Vec<Vec<Value>>,
    report: LoadReport,
}

impl LoadSession<'_> {
    /// Rows committed so far
    pub fn committed_rows(&self) -> u64 {
        self.report.rows_loaded
    }

    pub fn batches_written(&self) -> usize {
        self.report.batches
    }

    /// Buffer `rows`, writing every batch that fills up
    pub async fn push(&mut self, rows: Vec<Vec<Value>>) -> Result<()> {
        let batch_size = self.loader.batch_size;
        self.pending.extend(rows);

        let ready = self.pending.len() / batch_size * batch_size;
        if ready == 0 {
            return Ok(());
        }

        let full: Vec<Vec<Value>> = self.pending.drain(..ready).collect();
        for batch in full.chunks(batch_size) {
            self.write(batch).await?;
        }
        Ok(())
    }

    /// Write the remaining partial batch and report the totals
    pub async fn finish(mut self) -> Result<LoadReport> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.write(&rest).await?;
        }

        info!(
            destination = %self.destination,
            rows = self.report.rows_loaded,
            batches = self.report.batches,
            "load complete"
        );
        Ok(self.report)
    }

    async fn write(&mut self, rows: &[Vec<Value>]) -> Result<()> {
        let batch = self.report.batches;
        debug!(
            destination = %self.destination,
            batch = batch + 1,
            rows = rows.len(),
            "inserting batch"
        );

        match self
            .loader
            .warehouse
            .insert_batch(&self.destination, self.columns, rows)
            .await
        {
            Ok(written) => {
                self.report.rows_loaded += written;
                self.report.batches += 1;
                Ok(())
            },
            Err(cause) => {
                error!(
                    destination = %self.destination,
                    batch,
                    committed_rows = self.report.rows_loaded,
                    error = %cause,
                    "batch insert failed"
                );
                Err(EtlError::Load {
                    destination: self.destination.clone(),
                    batch,
                    committed_rows: self.report.rows_loaded,
                    cause,
                })
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn table_of(rows: usize, registry: &SchemaRegistry) -> Table {
        let columns: Vec<String> = registry.names().map(str::to_string).collect();
        let width = columns.len();
        Table::with_rows(
            columns,
            (0..rows)
                .map(|i| {
                    let mut row = vec![Value::Null; width];
                    row[0] = Value::Int(i as i64);
                    row
                })
                .collect(),
        )
    }

    #[test]
    fn test_destination_validation() {
        assert!(validate_destination("readmission").is_ok());
        assert!(validate_destination("analytics.readmission_v2").is_ok());
        assert!(validate_destination("").is_err());
        assert!(validate_destination("readmission; DROP TABLE x").is_err());
        assert!(validate_destination("1table").is_err());
        assert!(validate_destination("a.b.c").is_err());
    }

    #[tokio::test]
    async fn test_batches_are_sized() {
        let registry = SchemaRegistry::readmission();
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone(), 1000);

        let report = loader
            .load("readmission", &registry, &table_of(2500, &registry))
            .await
            .unwrap();

        assert_eq!(report, LoadReport { rows_loaded: 2500, batches: 3 });
        assert_eq!(warehouse.batch_sizes(), vec![1000, 1000, 500]);
    }

    #[tokio::test]
    async fn test_empty_table_loads_nothing() {
        let registry = SchemaRegistry::readmission();
        let warehouse = Arc::new(MemoryWarehouse::new());
        let report = Loader::new(warehouse.clone(), 10)
            .load("readmission", &registry, &table_of(0, &registry))
            .await
            .unwrap();

        assert_eq!(report.batches, 0);
        assert!(warehouse.batches().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_reports_committed_rows() {
        let registry = SchemaRegistry::readmission();
        let warehouse = Arc::new(MemoryWarehouse::failing_from(2));
        let err = Loader::new(warehouse.clone(), 100)
            .load("readmission", &registry, &table_of(450, &registry))
            .await
            .unwrap_err();

        match err {
            EtlError::Load {
                destination,
                batch,
                committed_rows,
                ..
            } => {
                assert_eq!(destination, "readmission");
                assert_eq!(batch, 2);
                assert_eq!(committed_rows, 200);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(warehouse.row_count(), 200);
    }

    #[tokio::test]
    async fn test_session_batches_across_pushes() {
        let registry = SchemaRegistry::readmission();
        let warehouse = Arc::new(MemoryWarehouse::new());
        let loader = Loader::new(warehouse.clone(), 10);
        let mut session = loader.begin("readmission", &registry).unwrap();

        session.push(table_of(7, &registry).rows().to_vec()).await.unwrap();
        assert_eq!(session.batches_written(), 0);

        session.push(table_of(7, &registry).rows().to_vec()).await.unwrap();
        assert_eq!(session.batches_written(), 1);
        assert_eq!(session.committed_rows(), 10);

        session.push(table_of(25, &registry).rows().to_vec()).await.unwrap();
        let report = session.finish().await.unwrap();

        assert_eq!(report, LoadReport { rows_loaded: 39, batches: 4 });
        assert_eq!(warehouse.batch_sizes(), vec![10, 10, 10, 9]);
    }

    #[tokio::test]
    async fn test_session_failure_counts_earlier_pushes() {
        let registry = SchemaRegistry::readmission();
        let warehouse = Arc::new(MemoryWarehouse::failing_from(2));
        let loader = Loader::new(warehouse.clone(), 5);
        let mut session = loader.begin("readmission", &registry).unwrap();

        session.push(table_of(6, &registry).rows().to_vec()).await.unwrap();
        let err = session
            .push(table_of(10, &registry).rows().to_vec())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EtlError::Load { batch: 2, committed_rows: 10, .. }
        ));
    }

    #[test]
    fn test_batch_params_overflow_is_config_error() {
        assert!(check_batch_params(1000, 26).is_ok());
        assert!(matches!(check_batch_params(5000, 26), Err(EtlError::Config(_))));
        assert!(matches!(
            check_batch_params(usize::MAX, 26),
            Err(EtlError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let registry = SchemaRegistry::readmission();
        let err = Loader::new(Arc::new(MemoryWarehouse::new()), 5000)
            .load("readmission", &registry, &table_of(1, &registry))
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }
}
