use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::fs;

use crate::core::error::{AppError, Result};
use crate::features::activities::mapper::message_from_json;
use crate::features::deadletters::jobs::{
    lookback_cutoff, step_name, DeadLetterJobs, COMPLETED_FILE_CLEANUP_JOB, FAILURE_PATH_PARAM,
    LISTENER_RESTORE_FROM_FILE_JOB,
};
use crate::features::deadletters::models::ListenerDeadLetter;
use crate::features::deadletters::stores::ListenerDeadLetterStore;
use crate::modules::batch::{
    ChunkComponents, ChunkStep, ItemProcessor, ItemReader, ItemWriter, Job, JobParameters,
};

const EDITING_PREFIX: &str = "editing--";
const COMPLETED_PREFIX: &str = "completed--";
/// This many locked files means earlier runs are stuck
const MAX_EDITING_FILES: usize = 100;
const RESTORE_CHUNK_SIZE: usize = 10;
const CLEANUP_CHUNK_SIZE: usize = 50;
pub const RETENTION_DAYS_PARAM: &str = "retentionDays";
const DEFAULT_RETENTION_DAYS: i64 = 7;

fn directory(params: &JobParameters, default: &Path) -> PathBuf {
    params
        .get(FAILURE_PATH_PARAM)
        .map(PathBuf::from)
        .unwrap_or_else(|| default.to_path_buf())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_json(name: &str) -> bool {
    name.ends_with(".json")
}

/// Regular files directly inside `dir`, sorted by name. `None` when the
/// directory does not exist.
async fn list_files(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    if !fs::try_exists(dir).await? {
        tracing::warn!("Failure path does not exist: {}", dir.display());
        return Ok(None);
    }

    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(Some(files))
}

#[derive(Debug, Clone, Copy)]
enum Scan {
    /// JSON files not yet locked or completed
    Unprocessed,
    /// `completed--*.json` files
    Completed,
}

/// Lists the directory on the first read, then returns one path per read
struct FailureFileReader {
    dir: PathBuf,
    scan: Scan,
    files: Option<VecDeque<PathBuf>>,
}

impl FailureFileReader {
    fn new(dir: PathBuf, scan: Scan) -> Self {
        Self {
            dir,
            scan,
            files: None,
        }
    }

    async fn load(&self) -> Result<VecDeque<PathBuf>> {
        let Some(files) = list_files(&self.dir).await? else {
            return Ok(VecDeque::new());
        };

        let selected: VecDeque<PathBuf> = match self.scan {
            Scan::Unprocessed => {
                let editing = files
                    .iter()
                    .filter(|path| file_name(path).starts_with(EDITING_PREFIX))
                    .count();
                if editing >= MAX_EDITING_FILES {
                    let message = format!(
                        "Too many editing files detected ({} >= {}). Job cannot proceed",
                        editing, MAX_EDITING_FILES
                    );
                    tracing::error!("{}", message);
                    return Err(AppError::IllegalState(message));
                }
                tracing::info!("Editing files in directory: {}", editing);

                let selected: VecDeque<PathBuf> = files
                    .into_iter()
                    .filter(|path| {
                        let name = file_name(path);
                        is_json(&name)
                            && !name.starts_with(EDITING_PREFIX)
                            && !name.starts_with(COMPLETED_PREFIX)
                    })
                    .collect();
                tracing::info!("Found {} JSON files to process", selected.len());
                selected
            }
            Scan::Completed => {
                let selected: VecDeque<PathBuf> = files
                    .into_iter()
                    .filter(|path| {
                        let name = file_name(path);
                        is_json(&name) && name.starts_with(COMPLETED_PREFIX)
                    })
                    .collect();
                tracing::info!("Found {} completed files to cleanup", selected.len());
                selected
            }
        };
        Ok(selected)
    }
}

#[async_trait]
impl ItemReader<PathBuf> for FailureFileReader {
    async fn read(&mut self) -> Result<Option<PathBuf>> {
        if self.files.is_none() {
            self.files = Some(self.load().await?);
        }
        Ok(self.files.as_mut().and_then(VecDeque::pop_front))
    }
}

/// A failure file renamed to `editing--<name>` and the letter parsed from it
#[derive(Debug)]
struct LockedFile {
    original: PathBuf,
    editing: PathBuf,
    letter: ListenerDeadLetter,
}

fn sibling(path: &Path, name: String) -> PathBuf {
    path.with_file_name(name)
}

struct FailureFileParser;

impl FailureFileParser {
    async fn parse(editing: &Path) -> Result<ListenerDeadLetter> {
        let contents = fs::read_to_string(editing).await?;
        let message = message_from_json(&contents)?;
        ListenerDeadLetter::from_message(&message)
    }

    /// Put a file that could not be parsed back where it was, or set it
    /// aside as `<name>.error`
    async fn release(original: &Path, editing: &Path) {
        let name = file_name(original);
        if fs::rename(editing, original).await.is_ok() {
            tracing::info!("File restored to original name after error: {}", name);
            return;
        }

        tracing::error!("Failed to restore original filename: {}", name);
        let error_file = sibling(original, format!("{}.error", name));
        if let Err(e) = fs::rename(editing, &error_file).await {
            tracing::warn!("Failed to rename file to .error: {}: {}", editing.display(), e);
        }
    }
}

#[async_trait]
impl ItemProcessor<PathBuf, LockedFile> for FailureFileParser {
    async fn process(&self, original: PathBuf) -> Result<Option<LockedFile>> {
        let name = file_name(&original);
        tracing::info!("Processing file: {}", name);

        let editing = sibling(&original, format!("{}{}", EDITING_PREFIX, name));
        if let Err(e) = fs::rename(&original, &editing).await {
            tracing::error!("Failed to rename file to editing state: {}: {}", name, e);
            return Ok(None);
        }

        match Self::parse(&editing).await {
            Ok(letter) => Ok(Some(LockedFile {
                original,
                editing,
                letter,
            })),
            Err(e) => {
                tracing::error!("Error processing file: {}: {}", name, e);
                Self::release(&original, &editing).await;
                Ok(None)
            }
        }
    }
}

struct FailureFileWriter {
    letters: Arc<dyn ListenerDeadLetterStore>,
}

impl FailureFileWriter {
    async fn complete(files: &[LockedFile]) {
        let mut completed = 0;
        let mut failed = 0;
        for file in files {
            let target = sibling(
                &file.original,
                format!("{}{}", COMPLETED_PREFIX, file_name(&file.original)),
            );
            match fs::rename(&file.editing, &target).await {
                Ok(()) => completed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        "Failed to rename to completed: {}: {}",
                        file.editing.display(),
                        e
                    );
                }
            }
        }
        tracing::info!(
            "File completion summary: {} completed, {} failed",
            completed,
            failed
        );
    }

    async fn unlock(files: &[LockedFile]) {
        let mut restored = 0;
        let mut failed = 0;
        for file in files {
            match fs::rename(&file.editing, &file.original).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        "Failed to restore original filename: {}: {}",
                        file.editing.display(),
                        e
                    );
                }
            }
        }
        tracing::info!(
            "File restoration summary: {} restored, {} failed",
            restored,
            failed
        );
    }
}

impl FailureFileWriter {
    /// Letters whose message key is neither stored already nor repeated
    /// earlier in the chunk
    async fn fresh_letters(&self, files: &[LockedFile]) -> Result<Vec<ListenerDeadLetter>> {
        let keys: Vec<String> = files.iter().map(|f| f.letter.message_key.clone()).collect();
        let existing = self.letters.find_existing_message_keys(&keys).await?;

        let mut seen = HashSet::new();
        Ok(files
            .iter()
            .map(|f| &f.letter)
            .filter(|l| !existing.contains(&l.message_key) && seen.insert(l.message_key.clone()))
            .cloned()
            .collect())
    }

    async fn save(&self, files: &[LockedFile]) -> Result<usize> {
        let fresh = self.fresh_letters(files).await?;
        if !fresh.is_empty() {
            self.letters.insert_all(&fresh).await?;
        }
        Ok(fresh.len())
    }
}

#[async_trait]
impl ItemWriter<LockedFile> for FailureFileWriter {
    async fn write(&self, files: Vec<LockedFile>) -> Result<()> {
        match self.save(&files).await {
            Ok(saved) => {
                tracing::info!(
                    "Saved {} listener dead letters ({} duplicates skipped)",
                    saved,
                    files.len() - saved
                );
                // Duplicates are already stored, so their files are done too
                Self::complete(&files).await;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "Saving listener dead letters failed. Restoring original filenames: {}",
                    e
                );
                Self::unlock(&files).await;
                Err(e)
            }
        }
    }
}

pub fn listener_restore_from_file_job(jobs: &DeadLetterJobs) -> Job {
    let letters = Arc::clone(&jobs.listener_letters);
    let default_dir = jobs.listener_file_path.clone();
    let name = LISTENER_RESTORE_FROM_FILE_JOB;

    Job::new(name).start(ChunkStep::new(
        step_name(name),
        RESTORE_CHUNK_SIZE,
        move |params| {
            Ok(ChunkComponents::new(
                FailureFileReader::new(directory(params, &default_dir), Scan::Unprocessed),
                FailureFileParser,
                FailureFileWriter {
                    letters: Arc::clone(&letters),
                },
            ))
        },
    ))
}

#[derive(Debug)]
enum Cleanup {
    Expired(PathBuf),
    /// Metadata could not be read; counted as failed and left in place
    Unreadable(PathBuf),
}

struct RetentionFilter {
    cutoff: DateTime<Utc>,
}

#[async_trait]
impl ItemProcessor<PathBuf, Cleanup> for RetentionFilter {
    async fn process(&self, path: PathBuf) -> Result<Option<Cleanup>> {
        let modified = match fs::metadata(&path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(e) => {
                tracing::error!("Error processing completed file: {}: {}", path.display(), e);
                return Ok(Some(Cleanup::Unreadable(path)));
            }
        };

        if modified < self.cutoff {
            tracing::debug!("File {} is past retention, marking for deletion", path.display());
            Ok(Some(Cleanup::Expired(path)))
        } else {
            tracing::debug!("File {} is within retention period, skipping", path.display());
            Ok(None)
        }
    }
}

struct CompletedFileRemover;

#[async_trait]
impl ItemWriter<Cleanup> for CompletedFileRemover {
    async fn write(&self, items: Vec<Cleanup>) -> Result<()> {
        let (mut deleted, mut failed, mut skipped) = (0, 0, 0);

        for item in items {
            let path = match item {
                Cleanup::Expired(path) => path,
                Cleanup::Unreadable(_) => {
                    failed += 1;
                    continue;
                }
            };

            match fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    tracing::info!("Successfully deleted completed file: {}", path.display());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    skipped += 1;
                    tracing::warn!("Completed file disappeared before deletion: {}", path.display());
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Failed to delete completed file: {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!(
            "Cleanup summary: {} deleted, {} failed, {} skipped",
            deleted,
            failed,
            skipped
        );
        Ok(())
    }
}

pub fn completed_file_cleanup_job(jobs: &DeadLetterJobs) -> Job {
    let default_dir = jobs.failure_path.clone();
    let name = COMPLETED_FILE_CLEANUP_JOB;

    Job::new(name).start(ChunkStep::new(
        step_name(name),
        CLEANUP_CHUNK_SIZE,
        move |params| {
            let cutoff = lookback_cutoff(
                params,
                RETENTION_DAYS_PARAM,
                DEFAULT_RETENTION_DAYS,
                Duration::try_days,
                Utc::now(),
            )?;
            Ok(ChunkComponents::new(
                FailureFileReader::new(directory(params, &default_dir), Scan::Completed),
                RetentionFilter { cutoff },
                CompletedFileRemover,
            ))
        },
    ))
}
