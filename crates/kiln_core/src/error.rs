use std::path::PathBuf;

use thiserror::Error;

use crate::RequestError;

#[derive(Clone, Debug, Error)]
pub enum IoError {
    #[error("at path {path:?}, error: {error}")]
    Io { error: String, path: PathBuf },
    #[error("couldn't read directory {parent:?}, error {error}")]
    ReadDir { error: String, parent: PathBuf },
    #[error("config or AppData directory not found")]
    ConfigDirNotFound,
    #[error("path {0:?} is outside parent directory. POTENTIAL SECURITY RISK AVOIDED")]
    DirEscapeAttack(PathBuf),
}

pub trait IntoIoError<T> {
    #[allow(clippy::missing_errors_doc)]
    fn path(self, p: impl Into<PathBuf>) -> Result<T, IoError>;
    #[allow(clippy::missing_errors_doc)]
    fn dir(self, p: impl Into<PathBuf>) -> Result<T, IoError>;
}

impl<T> IntoIoError<T> for std::io::Result<T> {
    fn path(self, p: impl Into<PathBuf>) -> Result<T, IoError> {
        self.map_err(|err: std::io::Error| IoError::Io {
            error: err.to_string(),
            path: p.into(),
        })
    }

    fn dir(self, p: impl Into<PathBuf>) -> Result<T, IoError> {
        self.map_err(|err: std::io::Error| IoError::ReadDir {
            error: err.to_string(),
            parent: p.into(),
        })
    }
}

pub trait IntoStringError<T> {
    #[allow(clippy::missing_errors_doc)]
    fn strerr(self) -> Result<T, String>;
}

impl<T, E: ToString> IntoStringError<T> for Result<T, E> {
    fn strerr(self) -> Result<T, String> {
        self.map_err(|err| err.to_string())
    }
}

const EXCERPT_LEN: usize = 400;

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("couldn't parse json: {error}\n\n--- excerpt ---\n{excerpt}")]
    From {
        error: serde_json::Error,
        excerpt: String,
    },
    #[error("couldn't serialize json: {error}")]
    To { error: serde_json::Error },
}

pub trait IntoJsonError<T> {
    /// Converts a deserialization error, keeping an
    /// excerpt of the offending `text` for the error message.
    #[allow(clippy::missing_errors_doc)]
    fn json(self, text: String) -> Result<T, JsonError>;
    /// Converts a serialization error.
    #[allow(clippy::missing_errors_doc)]
    fn json_to(self) -> Result<T, JsonError>;
}

impl<T> IntoJsonError<T> for Result<T, serde_json::Error> {
    fn json(self, text: String) -> Result<T, JsonError> {
        self.map_err(|error| {
            let mut excerpt: String = text.chars().take(EXCERPT_LEN).collect();
            if text.len() > excerpt.len() {
                excerpt.push_str("...");
            }
            JsonError::From { error, excerpt }
        })
    }

    fn json_to(self) -> Result<T, JsonError> {
        self.map_err(|error| JsonError::To { error })
    }
}

#[derive(Debug, Error)]
pub enum JsonDownloadError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Json(#[from] JsonError),
}

impl From<kiln_reqwest::Error> for JsonDownloadError {
    fn from(value: kiln_reqwest::Error) -> Self {
        Self::Request(RequestError::ReqwestError(value))
    }
}

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error(transparent)]
    Io(#[from] IoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_keeps_excerpt() {
        let text = "{ \"id\": ".to_owned();
        let err = serde_json::from_str::<serde_json::Value>(&text)
            .json(text)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"id\""), "{msg}");
    }

    #[test]
    fn io_error_names_path() {
        let err = std::fs::read("/definitely/not/here.json")
            .path("/definitely/not/here.json")
            .unwrap_err();
        assert!(err.to_string().contains("here.json"));
    }
}
