//! Per-file load of D0010 flows into a [`ReadingStore`].
//!
//! Files are processed one at a time. Each file is either loaded completely
//! (marker plus every parsed reading, in one transaction) or not at all;
//! only an invalid input path stops a run.

use std::path::{Path, PathBuf};

use futures::StreamExt;

use crate::{
    config::LoaderConfig,
    parser::{RecordError, RecordOutcome},
    sinks::{ReadingStore, StoreError, StoreTransaction},
    sources::{resolve_input_paths, D0010FileSource, SourceError},
};

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("invalid file type or path {}: {reason}", .path.display())]
    InvalidInputPath { path: PathBuf, reason: String },
    #[error("file not found: {}", .path.display())]
    FileVanished { path: PathBuf },
    #[error("file {filename} already processed")]
    DuplicateFile { filename: String },
    #[error("skipping invalid row in {filename} at line {line}: {raw} - {error}")]
    MalformedRecordLine {
        filename: String,
        line: u64,
        raw: String,
        error: RecordError,
    },
    #[error("error processing {filename}: {source}")]
    UnexpectedProcessingFailure {
        filename: String,
        source: ProcessingFailure,
    },
}

/// Anything that aborts a file mid-load and rolls its transaction back.
#[derive(thiserror::Error, Debug)]
pub enum ProcessingFailure {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub filename: String,
    pub file_id: i64,
    pub readings: u64,
    pub rejected_lines: u64,
}

#[derive(Debug)]
pub enum FileOutcome {
    Loaded(LoadedFile),
    /// Expected conditions: the file vanished or was already processed.
    Skipped(LoadError),
    /// The file's transaction was rolled back.
    Failed(LoadError),
}

#[derive(Debug, Default)]
pub struct LoadSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl LoadSummary {
    pub fn loaded(&self) -> impl Iterator<Item = &LoadedFile> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Loaded(f) => Some(f),
            _ => None,
        })
    }

    pub fn files_loaded(&self) -> usize {
        self.loaded().count()
    }

    pub fn files_skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Skipped(_)))
            .count()
    }

    pub fn files_failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed(_)))
            .count()
    }

    pub fn readings_loaded(&self) -> u64 {
        self.loaded().map(|f| f.readings).sum()
    }

    pub fn rejected_lines(&self) -> u64 {
        self.loaded().map(|f| f.rejected_lines).sum()
    }
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct FileLoader<S> {
    store: S,
    config: LoaderConfig,
}

impl<S: ReadingStore> FileLoader<S> {
    pub fn new(store: S, config: LoaderConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve `path` and load every file it names.
    pub async fn load_path(&self, path: &Path) -> Result<LoadSummary, LoadError> {
        let paths = resolve_input_paths(path, &self.config.extension)?;
        Ok(self.load_files(&paths).await)
    }

    pub async fn load_files(&self, paths: &[PathBuf]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for path in paths {
            summary.outcomes.push(self.load_file(path).await);
        }
        summary
    }

    pub async fn load_file(&self, path: &Path) -> FileOutcome {
        // The file may have been removed since the path was resolved.
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            let err = LoadError::FileVanished {
                path: path.to_path_buf(),
            };
            tracing::warn!(path = %path.display(), "{err}");
            metrics::counter!("d0010_files_skipped_total").increment(1);
            return FileOutcome::Skipped(err);
        }

        tracing::info!(path = %path.display(), "processing file");
        let filename = filename_of(path);

        let exists = self.store.file_record_exists(&filename).await;
        match exists {
            Ok(false) => {}
            Ok(true) => return Self::duplicate(filename),
            Err(e) => return Self::failed(filename, e.into()),
        }

        let ingested = self.ingest(path, &filename).await;
        match ingested {
            Ok(loaded) => {
                tracing::info!(
                    filename = %loaded.filename,
                    file_id = loaded.file_id,
                    rejected_lines = loaded.rejected_lines,
                    "successfully imported {} records",
                    loaded.readings
                );
                metrics::counter!("d0010_files_loaded_total").increment(1);
                metrics::counter!("d0010_readings_loaded_total").increment(loaded.readings);
                FileOutcome::Loaded(loaded)
            }
            // Another loader created the marker between our check and insert.
            Err(ProcessingFailure::Store(StoreError::DuplicateFilename(_))) => {
                Self::duplicate(filename)
            }
            Err(e) => Self::failed(filename, e),
        }
    }

    fn duplicate(filename: String) -> FileOutcome {
        let err = LoadError::DuplicateFile { filename };
        tracing::warn!("{err}, skipping");
        metrics::counter!("d0010_files_skipped_total").increment(1);
        FileOutcome::Skipped(err)
    }

    fn failed(filename: String, source: ProcessingFailure) -> FileOutcome {
        let err = LoadError::UnexpectedProcessingFailure { filename, source };
        tracing::error!("{err}");
        metrics::counter!("d0010_files_failed_total").increment(1);
        FileOutcome::Failed(err)
    }

    async fn ingest(&self, path: &Path, filename: &str) -> Result<LoadedFile, ProcessingFailure> {
        let mut tx = self.store.begin().await?;

        let written = self.write_file(tx.as_mut(), path, filename).await;
        match written {
            Ok(loaded) => {
                tx.commit().await?;
                Ok(loaded)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(filename, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn write_file(
        &self,
        tx: &mut (dyn StoreTransaction + 'static),
        path: &Path,
        filename: &str,
    ) -> Result<LoadedFile, ProcessingFailure> {
        let record = tx.create_file_record(filename).await?;

        let mut loaded = LoadedFile {
            filename: filename.to_string(),
            file_id: record.id,
            readings: 0,
            rejected_lines: 0,
        };

        let batch_size = self.config.batch_size.max(1);
        let mut buffer = Vec::with_capacity(batch_size);
        let mut stream = D0010FileSource::new(path).stream(record.id);

        while let Some(outcome) = stream.next().await {
            match outcome? {
                RecordOutcome::Reading(reading) => {
                    buffer.push(reading);
                    if buffer.len() >= batch_size {
                        loaded.readings += tx.bulk_insert_readings(&buffer).await?;
                        buffer.clear();
                    }
                }
                RecordOutcome::Malformed(malformed) => {
                    loaded.rejected_lines += 1;
                    let warning = LoadError::MalformedRecordLine {
                        filename: filename.to_string(),
                        line: malformed.line,
                        raw: malformed.raw,
                        error: malformed.error,
                    };
                    tracing::warn!("{warning}");
                }
            }
        }

        if !buffer.is_empty() {
            loaded.readings += tx.bulk_insert_readings(&buffer).await?;
        }

        Ok(loaded)
    }
}
