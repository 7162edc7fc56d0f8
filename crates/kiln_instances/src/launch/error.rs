use std::path::PathBuf;

use kiln_core::IoError;
use kiln_java_handler::JavaInstallError;
use thiserror::Error;

use crate::natives::NativesError;

const GAME_ERR_PREFIX: &str = "while launching game:\n";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{GAME_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{GAME_ERR_PREFIX}{0}")]
    JavaInstall(#[from] JavaInstallError),
    #[error("{GAME_ERR_PREFIX}{0}")]
    Natives(#[from] NativesError),
    #[error("username is empty")]
    UsernameIsEmpty,
    #[error("username contains spaces")]
    UsernameHasSpaces,
    #[error("{GAME_ERR_PREFIX}Java runtime not found at {0:?}")]
    RuntimeNotFound(PathBuf),
    #[error("{GAME_ERR_PREFIX}couldn't run {program:?}: {error}")]
    Spawn {
        program: PathBuf,
        error: std::io::Error,
    },
    #[error("{GAME_ERR_PREFIX}game process: {0}")]
    Process(std::io::Error),
}
