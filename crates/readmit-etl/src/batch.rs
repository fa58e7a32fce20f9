// Batch processing of an upload directory
//
// Scans the upload directory for `*.csv` files in name order and runs the
// pipeline over each one in turn. A file that loads is moved to the
// processed directory; a file that fails at any stage is moved to the failed
// directory. Nothing is retried.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::pipeline::{LoadSummary, Pipeline};

pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PROCESSED_DIR: &str = "processed";
pub const DEFAULT_FAILED_DIR: &str = "failed";

/// Directory partitions used by batch mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDirs {
    pub upload: PathBuf,
    pub processed: PathBuf,
    pub failed: PathBuf,
}

impl Default for BatchDirs {
    fn default() -> Self {
        Self {
            upload: PathBuf::from(DEFAULT_UPLOAD_DIR),
            processed: PathBuf::from(DEFAULT_PROCESSED_DIR),
            failed: PathBuf::from(DEFAULT_FAILED_DIR),
        }
    }
}

impl BatchDirs {
    /// Put all three partitions under one root
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            upload: root.join(DEFAULT_UPLOAD_DIR),
            processed: root.join(DEFAULT_PROCESSED_DIR),
            failed: root.join(DEFAULT_FAILED_DIR),
        }
    }

    /// Create the processed and failed partitions if needed
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.processed).await?;
        tokio::fs::create_dir_all(&self.failed).await?;
        Ok(())
    }
}

/// What happened to one file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed { summary: LoadSummary },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: FileOutcome,
    /// Where the file ended up, if it could be moved
    pub moved_to: Option<PathBuf>,
}

impl FileReport {
    pub fn is_processed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Processed { .. })
    }
}

/// Tally of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.files.iter().filter(|f| f.is_processed()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.processed()
    }

    pub fn rows_loaded(&self) -> u64 {
        self.files
            .iter()
            .filter_map(|f| match &f.outcome {
                FileOutcome::Processed { summary } => Some(summary.rows_loaded),
                FileOutcome::Failed { .. } => None,
            })
            .sum()
    }
}

pub struct BatchRunner {
    pipeline: Arc<Pipeline>,
    dirs: BatchDirs,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<Pipeline>, dirs: BatchDirs) -> Self {
        Self { pipeline, dirs }
    }

    pub fn dirs(&self) -> &BatchDirs {
        &self.dirs
    }

    /// CSV files waiting in the upload directory, sorted by name
    pub async fn pending_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dirs.upload).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
            if is_csv && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Process every pending file, one at a time
    pub async fn run(&self) -> Result<BatchReport> {
        self.dirs.ensure().await?;

        info!(dir = %self.dirs.upload.display(), "scanning for CSV files");
        let files = self.pending_files().await?;

        let mut report = BatchReport::default();
        if files.is_empty() {
            info!(dir = %self.dirs.upload.display(), "no CSV files found");
            return Ok(report);
        }

        for path in files {
            report.files.push(self.process(&path).await);
        }

        info!(
            files = report.files.len(),
            processed = report.processed(),
            failed = report.failed(),
            rows = report.rows_loaded(),
            "batch complete"
        );

        Ok(report)
    }

    /// Load one file and move it to the processed or failed partition
    ///
    /// Never fails: a pipeline error becomes a `Failed` outcome. The
    /// partitions are expected to exist (see [`BatchDirs::ensure`]).
    pub async fn process(&self, path: &Path) -> FileReport {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let started_at = Utc::now();
        info!(file = %file_name, "processing");

        let (outcome, target_dir) = match self.pipeline.run_file(path).await {
            Ok(summary) => {
                info!(
                    file = %file_name,
                    rows = summary.rows_loaded,
                    start = %summary.started_at,
                    end = %summary.finished_at,
                    "completed"
                );
                (FileOutcome::Processed { summary }, &self.dirs.processed)
            },
            Err(e) => {
                error!(file = %file_name, error = %e, "failed");
                (
                    FileOutcome::Failed {
                        error: e.to_string(),
                    },
                    &self.dirs.failed,
                )
            },
        };

        let moved_to = match move_into(path, target_dir).await {
            Ok(dest) => Some(dest),
            Err(e) => {
                warn!(file = %file_name, dir = %target_dir.display(), error = %e, "could not move file");
                None
            },
        };

        FileReport {
            file_name,
            started_at,
            finished_at: Utc::now(),
            outcome,
            moved_to,
        }
    }
}

/// Move a file into `dir`, copying across filesystems when rename fails
pub async fn move_into(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let dest = dir.join(name);

    if tokio::fs::rename(path, &dest).await.is_err() {
        tokio::fs::copy(path, &dest).await?;
        tokio::fs::remove_file(path).await?;
    }

    Ok(dest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::load::MemoryWarehouse;
    use crate::pipeline::PipelineConfig;

    fn runner(root: &Path) -> BatchRunner {
        let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(MemoryWarehouse::new()));
        BatchRunner::new(Arc::new(pipeline), BatchDirs::under(root))
    }

    #[tokio::test]
    async fn test_pending_files_are_sorted_csv_only() {
        let root = tempfile::tempdir().unwrap();
        let dirs = BatchDirs::under(root.path());
        std::fs::create_dir_all(&dirs.upload).unwrap();
        for name in ["b.csv", "a.csv", "notes.txt", "c.CSV"] {
            std::fs::write(dirs.upload.join(name), "AGE\n1\n").unwrap();
        }
        std::fs::create_dir_all(dirs.upload.join("nested.csv")).unwrap();

        let files = runner(root.path()).pending_files().await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[tokio::test]
    async fn test_empty_upload_dir_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(DEFAULT_UPLOAD_DIR)).unwrap();

        let report = runner(root.path()).run().await.unwrap();
        assert!(report.files.is_empty());
        assert!(root.path().join(DEFAULT_PROCESSED_DIR).is_dir());
        assert!(root.path().join(DEFAULT_FAILED_DIR).is_dir());
    }

    #[tokio::test]
    async fn test_process_single_file_outside_upload_dir() {
        let root = tempfile::tempdir().unwrap();
        let runner = runner(root.path());
        runner.dirs().ensure().await.unwrap();

        let good = root.path().join("admissions.csv");
        std::fs::write(&good, "SUBJECT_ID,AGE\n1,70\n").unwrap();
        let report = runner.process(&good).await;
        assert!(report.is_processed());
        assert_eq!(report.moved_to, Some(runner.dirs().processed.join("admissions.csv")));
        assert!(!good.exists());

        let bad = root.path().join("weather.csv");
        std::fs::write(&bad, "city,temp\nOslo,3\n").unwrap();
        let report = runner.process(&bad).await;
        assert!(matches!(report.outcome, FileOutcome::Failed { .. }));
        assert_eq!(report.moved_to, Some(runner.dirs().failed.join("weather.csv")));
        assert!(!bad.exists());
    }

    #[tokio::test]
    async fn test_move_into_directory() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("x.csv");
        std::fs::write(&src, "AGE\n").unwrap();
        let dir = root.path().join("done");
        std::fs::create_dir_all(&dir).unwrap();

        let dest = move_into(&src, &dir).await.unwrap();
        assert_eq!(dest, dir.join("x.csv"));
        assert!(dest.exists());
        assert!(!src.exists());
    }
}
