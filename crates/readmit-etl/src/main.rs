//! Readmit ETL - batch loader for admission CSV files

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use readmit_common::logging::{init_logging, LogConfig, LogLevel};
use readmit_etl::{
    BatchRunner, EtlConfig, FileOutcome, MemoryWarehouse, PgWarehouse, Pipeline, Warehouse,
};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "readmit-etl")]
#[command(author, version, about = "Load admission CSV files into the readmission warehouse")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Destination table
    #[arg(long, global = true)]
    table: Option<String>,

    /// Rows per INSERT statement
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Read sources in chunks instead of all at once
    #[arg(long, global = true)]
    chunked: bool,

    /// Rows per chunk when --chunked is set
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Run every stage but keep loaded rows in memory
    #[arg(long, global = true)]
    dry_run: bool,

    /// Apply database migrations before loading
    #[arg(long, global = true)]
    migrate: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every CSV file in the upload directory
    Batch {
        /// Directory scanned for *.csv files
        #[arg(long, env = "ETL_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,

        /// Where successfully loaded files are moved
        #[arg(long, env = "ETL_PROCESSED_DIR")]
        processed_dir: Option<PathBuf>,

        /// Where files that failed any stage are moved
        #[arg(long, env = "ETL_FAILED_DIR")]
        failed_dir: Option<PathBuf>,
    },

    /// Process a single file, then move it to the processed or failed directory
    File {
        /// CSV file to load
        path: PathBuf,

        /// Where the file is moved when it loads
        #[arg(long, env = "ETL_PROCESSED_DIR")]
        processed_dir: Option<PathBuf>,

        /// Where the file is moved when any stage fails
        #[arg(long, env = "ETL_FAILED_DIR")]
        failed_dir: Option<PathBuf>,
    },
}

impl Cli {
    fn apply(&self, config: &mut EtlConfig) {
        if let Some(ref table) = self.table {
            config.destination = table.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if self.chunked {
            config.chunked = true;
        }
        let (upload_dir, processed_dir, failed_dir) = match &self.command {
            Command::Batch {
                upload_dir,
                processed_dir,
                failed_dir,
            } => (upload_dir, processed_dir, failed_dir),
            Command::File {
                processed_dir,
                failed_dir,
                ..
            } => (&None, processed_dir, failed_dir),
        };
        if let Some(dir) = upload_dir {
            config.dirs.upload = dir.clone();
        }
        if let Some(dir) = processed_dir {
            config.dirs.processed = dir.clone();
        }
        if let Some(dir) = failed_dir {
            config.dirs.failed = dir.clone();
        }
    }
}

async fn warehouse(cli: &Cli, config: &EtlConfig) -> Result<Arc<dyn Warehouse>> {
    if cli.dry_run {
        warn!("dry run: rows will not be written to the warehouse");
        return Ok(Arc::new(MemoryWarehouse::new()));
    }

    let url = config.require_database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("Failed to connect to the warehouse")?;

    info!("Database connection pool established");

    if cli.migrate {
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations completed");
    }

    Ok(Arc::new(PgWarehouse::new(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("readmit-etl")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    init_logging(&log_config)?;

    let mut config = EtlConfig::from_env();
    cli.apply(&mut config);
    config.validate()?;

    info!(
        destination = %config.destination,
        batch_size = config.batch_size,
        mode = ?config.extract_mode(),
        "Starting readmit-etl"
    );

    let pipeline = Arc::new(Pipeline::new(
        config.pipeline_config(),
        warehouse(&cli, &config).await?,
    ));

    match cli.command {
        Command::Batch { .. } => {
            let report = BatchRunner::new(pipeline, config.dirs.clone()).run().await?;
            info!(
                processed = report.processed(),
                failed = report.failed(),
                rows = report.rows_loaded(),
                "Batch ETL completed"
            );
        },
        Command::File { ref path, .. } => {
            let runner = BatchRunner::new(pipeline, config.dirs.clone());
            runner.dirs().ensure().await?;

            let report = runner.process(path).await;
            let moved_to = report
                .moved_to
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not moved)".to_string());

            match report.outcome {
                FileOutcome::Processed { ref summary } => info!(
                    file = %report.file_name,
                    rows = summary.rows_loaded,
                    batches = summary.batches,
                    checksum = %summary.checksum,
                    moved_to = %moved_to,
                    "File loaded"
                ),
                FileOutcome::Failed { ref error } => {
                    anyhow::bail!("{} failed (moved to {}): {}", report.file_name, moved_to, error)
                },
            }
        },
    }

    Ok(())
}
