//! The download engine.
//!
//! Executes a list of [`DownloadTask`]s with bounded concurrency:
//! - a task whose target already exists with the expected size
//!   (or is non-empty when the size is unknown) makes no request
//! - bytes are streamed into a fresh `<file>.<random>.part` and moved
//!   into place only once the size and SHA-1 check out
//! - failed attempts are retried after a fixed delay, up to the
//!   task's attempt count; a non-success HTTP status removes
//!   whatever was written for that file
//! - exhausting the attempts fails the whole run, unless the task
//!   is marked non-critical, in which case it's logged and skipped

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::{
    do_jobs_with_limit, err, pt, IntoIoError, IoError, Phase, ProgressSender, RequestError,
    CLIENT,
};

pub const DEFAULT_ATTEMPTS: u8 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTask {
    pub path: PathBuf,
    /// Empty if the file can't be fetched and must already exist
    /// (installer-generated jars, for example).
    pub url: String,
    /// 0 = unknown
    pub size: u64,
    pub sha1: Option<String>,
    pub label: String,
    pub attempts: u8,
    /// Failure of a non-critical task is logged instead of aborting the run.
    pub critical: bool,
}

impl DownloadTask {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            size: 0,
            sha1: None,
            label: label.into(),
            attempts: DEFAULT_ATTEMPTS,
            critical: true,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1;
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Whether the target already exists with the expected size
    /// (or is non-empty, when the size is unknown).
    pub async fn is_satisfied(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {
                if self.size == 0 {
                    meta.len() > 0
                } else {
                    meta.len() == self.size
                }
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    AlreadyPresent,
    Downloaded,
    /// A non-critical task that failed every attempt.
    Skipped,
    /// Not started because the run was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub already_present: usize,
    pub skipped: usize,
}

const DOWNLOAD_ERR_PREFIX: &str = "while downloading files:\n";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{DOWNLOAD_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{DOWNLOAD_ERR_PREFIX}size mismatch for {label}: expected {expected} bytes, got {got}")]
    SizeMismatch { label: String, expected: u64, got: u64 },
    #[error("{DOWNLOAD_ERR_PREFIX}checksum mismatch for {label}: expected {expected}, got {got}")]
    ChecksumMismatch {
        label: String,
        expected: String,
        got: String,
    },
    #[error("{DOWNLOAD_ERR_PREFIX}{label} has no download URL and {path:?} doesn't exist")]
    NoSource { label: String, path: PathBuf },
    #[error("{DOWNLOAD_ERR_PREFIX}gave up on {label} after {attempts} attempts ({url})\n{source}")]
    Exhausted {
        label: String,
        url: String,
        attempts: u8,
        source: Box<DownloadError>,
    },
    #[error("{DOWNLOAD_ERR_PREFIX}cancelled")]
    Cancelled,
}

impl DownloadError {
    /// The HTTP status of the last failed request, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<kiln_reqwest::StatusCode> {
        match self {
            DownloadError::Request(err) => err.status(),
            DownloadError::Exhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Runs download tasks. Cheap to clone; clones share the cancellation token.
#[derive(Debug, Clone)]
pub struct Downloader {
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Use `token` to cancel: tasks that haven't started yet are
    /// dropped, in-flight ones finish, and the run reports
    /// [`DownloadError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Executes `tasks` with at most `concurrency` in flight,
    /// reporting each finished task on `progress` under `phase`.
    ///
    /// # Errors
    /// - the first critical task that exhausts its attempts
    /// - [`DownloadError::Cancelled`] if cancelled meanwhile
    pub async fn execute(
        &self,
        tasks: &[DownloadTask],
        concurrency: usize,
        phase: Phase,
        progress: &ProgressSender,
    ) -> Result<DownloadReport, DownloadError> {
        let total = tasks.len();
        let done = AtomicUsize::new(0);
        progress.report(phase, 0, total, None);

        let jobs = tasks.iter().map(|task| {
            let done = &done;
            async move {
                let outcome = self.fetch(task).await?;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(phase, finished, total, Some(task.label.clone()));
                Ok::<_, DownloadError>(outcome)
            }
        });
        let outcomes = do_jobs_with_limit(jobs, concurrency).await?;

        if self.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let mut report = DownloadReport::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::AlreadyPresent => report.already_present += 1,
                TaskOutcome::Downloaded => report.downloaded += 1,
                TaskOutcome::Skipped => report.skipped += 1,
                TaskOutcome::Cancelled => {}
            }
        }
        Ok(report)
    }

    /// Fetches a single task, honoring its short-circuit and retry policy.
    ///
    /// # Errors
    /// If a critical task fails all of its attempts.
    pub async fn fetch(&self, task: &DownloadTask) -> Result<TaskOutcome, DownloadError> {
        if self.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }
        if task.is_satisfied().await {
            return Ok(TaskOutcome::AlreadyPresent);
        }
        if task.url.is_empty() {
            let error = DownloadError::NoSource {
                label: task.label.clone(),
                path: task.path.clone(),
            };
            return self.give_up(task, error);
        }

        let attempts = task.attempts.max(1);
        let mut attempt = 1;
        let error = loop {
            match self.attempt(task).await {
                Ok(()) => return Ok(TaskOutcome::Downloaded),
                Err(error) if attempt >= attempts => break error,
                Err(error) => {
                    pt!(
                        "Retrying {} ({attempt}/{attempts} failed): {error}",
                        task.label
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        };

        self.give_up(
            task,
            DownloadError::Exhausted {
                label: task.label.clone(),
                url: task.url.clone(),
                attempts,
                source: Box::new(error),
            },
        )
    }

    #[allow(clippy::unused_self)]
    fn give_up(&self, task: &DownloadTask, error: DownloadError) -> Result<TaskOutcome, DownloadError> {
        if task.critical {
            Err(error)
        } else {
            err!("Skipping optional file {}: {error}", task.label);
            Ok(TaskOutcome::Skipped)
        }
    }

    async fn attempt(&self, task: &DownloadTask) -> Result<(), DownloadError> {
        let parent = task.path.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(parent).await.path(parent)?;

        let response = CLIENT
            .get(&task.url)
            .send()
            .await
            .map_err(RequestError::from)?;
        if !response.status().is_success() {
            remove_if_exists(&task.path).await?;
            return Err(RequestError::DownloadError {
                code: response.status(),
                url: response.url().clone(),
            }
            .into());
        }

        // Every attempt gets its own part file, so two installs fetching
        // the same file can't truncate each other. It's removed on drop
        // unless persisted.
        let (file, part) = part_file(&task.path, parent)?.into_parts();
        stream_to_file(task, response, tokio::fs::File::from_std(file), &part).await?;

        part.persist(&task.path)
            .map_err(|err| err.error)
            .path(&task.path)?;
        Ok(())
    }
}

fn part_file(path: &Path, parent: &Path) -> Result<tempfile::NamedTempFile, IoError> {
    let mut prefix = path.file_name().unwrap_or_default().to_os_string();
    prefix.push(".");
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(parent)
        .path(parent)
}

async fn stream_to_file(
    task: &DownloadTask,
    response: kiln_reqwest::Response,
    mut file: tokio::fs::File,
    part: &Path,
) -> Result<(), DownloadError> {
    let mut hasher = task.sha1.as_ref().map(|_| sha1_smol::Sha1::new());
    let mut written: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RequestError::from)?;
        if let Some(hasher) = &mut hasher {
            hasher.update(&chunk);
        }
        file.write_all(&chunk).await.path(part)?;
        written += chunk.len() as u64;
    }
    file.flush().await.path(part)?;
    drop(file);

    if task.size > 0 && written != task.size {
        return Err(DownloadError::SizeMismatch {
            label: task.label.clone(),
            expected: task.size,
            got: written,
        });
    }
    if let (Some(expected), Some(hasher)) = (&task.sha1, hasher) {
        let got = hasher.digest().to_string();
        if !got.eq_ignore_ascii_case(expected) {
            return Err(DownloadError::ChecksumMismatch {
                label: task.label.clone(),
                expected: expected.clone(),
                got,
            });
        }
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), IoError> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        result => result.path(path),
    }
}
