//! Core pieces shared by every Kiln crate.
//!
//! # Contains
//! - Launcher directory layout and config
//! - File and network utilities
//! - Error types
//! - Upstream JSON structs (version manifest, version JSON, asset index)
//!   and the normalized [`json::VersionDescriptor`]
//! - The platform model and the library/argument rule evaluator
//! - The download engine
//! - Logging macros

pub mod config;
pub mod download;
mod error;
/// Common utilities for working with files.
pub mod file_utils;
/// JSON structs for the version manifest, version JSON,
/// asset index and the normalized descriptor.
pub mod json;
mod layout;
mod loader;
pub mod platform;
/// Logging macros.
pub mod print;
mod progress;
pub mod rules;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::{future::Future, sync::LazyLock, time::Duration};

use futures::StreamExt;

pub use error::{
    IntoIoError, IntoJsonError, IntoStringError, IoError, JsonDownloadError, JsonError,
    JsonFileError,
};
pub use file_utils::RequestError;
pub use kiln_reqwest::StatusCode;
pub use layout::LauncherDirs;
pub use loader::Loader;
pub use platform::{Arch, Os, Platform};
pub use print::{logger_finish, LoggingState, LOGGER};
pub use progress::{Phase, ProgressEvent, ProgressSender};

pub const CLASSPATH_SEPARATOR: char = if cfg!(unix) { ':' } else { ';' };

pub const LAUNCHER_NAME: &str = "kiln";
pub const LAUNCHER_VERSION_NAME: &str = env!("CARGO_PKG_VERSION");

const USER_AGENT: &str = concat!("kiln-launcher/", env!("CARGO_PKG_VERSION"));

/// To prevent spawning of terminal (windows only).
///
/// Takes in a &mut Command (both `tokio` or `std` will do).
#[macro_export]
macro_rules! no_window {
    ($cmd:expr) => {
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            // 0x08000000 => CREATE_NO_WINDOW
            $cmd.creation_flags(0x08000000);
        }
    };
}

/// Implements `From<JsonDownloadError>` and `From<JsonFileError>`
/// for an error enum that has `Json`, `Request` and `Io` style variants.
///
/// ```ignore
/// impl_3_errs_jri!(ResolveError, Json, Request, Io);
/// ```
#[macro_export]
macro_rules! impl_3_errs_jri {
    ($t:ty, $json:ident, $request:ident, $io:ident) => {
        impl From<$crate::JsonDownloadError> for $t {
            fn from(value: $crate::JsonDownloadError) -> Self {
                match value {
                    $crate::JsonDownloadError::Request(err) => Self::$request(err),
                    $crate::JsonDownloadError::Json(err) => Self::$json(err),
                }
            }
        }

        impl From<$crate::JsonFileError> for $t {
            fn from(value: $crate::JsonFileError) -> Self {
                match value {
                    $crate::JsonFileError::Json(err) => Self::$json(err),
                    $crate::JsonFileError::Io(err) => Self::$io(err),
                }
            }
        }
    };
}

pub static CLIENT: LazyLock<kiln_reqwest::Client> = LazyLock::new(|| {
    kiln_reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
});

/// Performs multiple async tasks concurrently,
/// with at most `limit` of them in flight at once.
///
/// Returns the outputs in completion order.
/// The first error stops polling and is returned,
/// dropping the tasks that were still running.
pub async fn do_jobs_with_limit<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
    limit: usize,
) -> Result<Vec<T>, E> {
    let limit = limit.max(1);
    let mut tasks = futures::stream::FuturesUnordered::new();
    let mut outputs = Vec::new();

    for result in results {
        tasks.push(result);
        if tasks.len() >= limit {
            if let Some(task) = tasks.next().await {
                outputs.push(task?);
            }
        }
    }

    while let Some(task) = tasks.next().await {
        outputs.push(task?);
    }
    Ok(outputs)
}

/// Performs multiple async tasks concurrently (64 at a time).
pub async fn do_jobs<T, E>(
    results: impl Iterator<Item = impl Future<Output = Result<T, E>>>,
) -> Result<Vec<T>, E> {
    const JOBS: usize = 64;
    do_jobs_with_limit(results, JOBS).await
}

/// Number of attempts [`retry`] makes before giving up.
pub const RETRY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Runs `f` until it succeeds, at most [`RETRY_ATTEMPTS`] times,
/// sleeping a short fixed delay between attempts.
///
/// # Errors
/// Returns the error of the last attempt.
pub async fn retry<T, E, F, Fut>(mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut result = f().await;
    for _ in 1..RETRY_ATTEMPTS {
        if result.is_ok() {
            break;
        }
        tokio::time::sleep(RETRY_DELAY).await;
        result = f().await;
    }
    result
}
