use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{retry, IntoIoError, IntoJsonError, IoError, JsonDownloadError, CLIENT};

const LAUNCHER_DIR_NAME: &str = "KilnLauncher";
const PORTABLE_FILENAME: &str = "kilndir.txt";
const DIR_ENV_VAR: &str = "KILN_DIR";

/// Returns the path to the Kiln root folder, creating it if needed.
///
/// In order of priority:
/// - the `KILN_DIR` environment variable
/// - the first line of a `kilndir.txt` placed next to the executable
///   or in the current directory (portable mode, `.` means "this folder")
/// - the system config dir:
///   - `~/.config` on Linux
///   - `~/AppData/Roaming` on Windows
///   - `~/Library/Application Support` on macOS
///
/// # Errors
/// - if config dir is not found
/// - if the launcher directory could not be created (permissions issue)
pub fn get_launcher_dir() -> Result<PathBuf, IoError> {
    let launcher_directory = if let Some(dir) = std::env::var_os(DIR_ENV_VAR) {
        PathBuf::from(dir)
    } else if let Some(dir) = check_portable_file() {
        dir
    } else {
        dirs::config_dir()
            .ok_or(IoError::ConfigDirNotFound)?
            .join(LAUNCHER_DIR_NAME)
    };

    std::fs::create_dir_all(&launcher_directory).path(&launcher_directory)?;
    Ok(launcher_directory)
}

fn check_portable_file() -> Option<PathBuf> {
    let places = [
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_owned)),
        std::env::current_dir().ok(),
    ];

    for place in places.into_iter().flatten() {
        let Ok(contents) = std::fs::read_to_string(place.join(PORTABLE_FILENAME)) else {
            continue;
        };
        let first_line = contents.lines().next().unwrap_or_default().trim();

        return Some(if first_line.is_empty() || first_line == "." {
            place
        } else if let (Some(stripped), Some(home)) =
            (first_line.strip_prefix("~/"), dirs::home_dir())
        {
            home.join(stripped)
        } else {
            PathBuf::from(first_line)
        });
    }

    None
}

/// Downloads a file from the given URL into a `String`.
///
/// # Errors
/// Returns an error if:
/// - Error sending request
/// - Request is rejected (HTTP status code)
/// - Redirect loop detected
/// - Redirect limit exhausted.
pub async fn download_file_to_string(url: &str) -> Result<String, RequestError> {
    async fn inner(url: &str) -> Result<String, RequestError> {
        let response = CLIENT.get(url).send().await?;
        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(RequestError::DownloadError {
                code: response.status(),
                url: response.url().clone(),
            })
        }
    }

    retry(|| inner(url)).await
}

/// Downloads a file from the given URL into a JSON.
///
/// More specifically, it tries to parse the contents
/// into anything implementing `serde::Deserialize`
///
/// # Errors
/// Returns an error if:
/// - Error sending request
/// - Request is rejected (HTTP status code)
/// - The response isn't valid JSON for `T`
pub async fn download_file_to_json<T: DeserializeOwned>(
    url: &str,
) -> Result<T, JsonDownloadError> {
    let text = download_file_to_string(url).await?;
    Ok(serde_json::from_str(&text).json(text)?)
}

/// Downloads a file from the given URL into a `Vec<u8>`.
///
/// # Errors
/// Returns an error if:
/// - Error sending request
/// - Request is rejected (HTTP status code)
/// - Redirect loop detected
/// - Redirect limit exhausted.
pub async fn download_file_to_bytes(url: &str) -> Result<Vec<u8>, RequestError> {
    async fn inner(url: &str) -> Result<Vec<u8>, RequestError> {
        let response = CLIENT.get(url).send().await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(RequestError::DownloadError {
                code: response.status(),
                url: response.url().clone(),
            })
        }
    }

    retry(|| inner(url)).await
}

/// Reads and parses a JSON file.
///
/// # Errors
/// If the file can't be read or isn't valid JSON for `T`.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, crate::JsonFileError> {
    let text = tokio::fs::read_to_string(path).await.path(path)?;
    Ok(serde_json::from_str(&text).json(text)?)
}

/// Serializes `value` (pretty-printed) and writes it to `path`,
/// creating parent directories as needed.
///
/// # Errors
/// If serialization fails or the file can't be written.
pub async fn write_json_file<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), crate::JsonFileError> {
    let text = serde_json::to_string_pretty(value).json_to()?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.path(parent)?;
    }
    tokio::fs::write(path, text).await.path(path)?;
    Ok(())
}

const NETWORK_ERROR_MSG: &str = r"
- Check your internet connection
- Check if you are behind a firewall/proxy
- Try doing the action again

";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Download Error (code {code}){NETWORK_ERROR_MSG}Url: {url}")]
    DownloadError {
        code: kiln_reqwest::StatusCode,
        url: kiln_reqwest::Url,
    },
    #[error("Network Request Error{NETWORK_ERROR_MSG}{0}")]
    ReqwestError(#[from] kiln_reqwest::Error),
}

impl RequestError {
    /// The HTTP status the server answered with, if it answered at all.
    #[must_use]
    pub fn status(&self) -> Option<kiln_reqwest::StatusCode> {
        match self {
            RequestError::DownloadError { code, .. } => Some(*code),
            RequestError::ReqwestError(err) => err.status(),
        }
    }
}

/// Sets the executable bit on a file.
///
/// This makes a file executable on Unix systems,
/// ie. it can be run as a program.
///
/// # Errors
/// Returns an error if:
/// - the file does not exist
/// - the user doesn't have permission to change the file metadata
#[cfg(target_family = "unix")]
pub async fn set_executable(path: &Path) -> Result<(), IoError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await.path(path)?.permissions();
    perms.set_mode(0o755); // rwxr-xr-x
    tokio::fs::set_permissions(path, perms).await.path(path)
}

/// Recursively copies `src` into `dest`, skipping files
/// that already exist at the destination with the same size.
///
/// # Errors
/// If any file can't be read or written.
pub fn copy_dir_incremental(src: &Path, dest: &Path) -> Result<usize, IoError> {
    let mut copied = 0;
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(|err| IoError::ReadDir {
            error: err.to_string(),
            parent: src.to_owned(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).path(&target)?;
            continue;
        }
        let len = entry.metadata().map(|m| m.len()).ok();
        if std::fs::metadata(&target).map(|m| m.len()).ok() == len {
            continue;
        }
        std::fs::copy(entry.path(), &target).path(&target)?;
        copied += 1;
    }
    Ok(copied)
}
