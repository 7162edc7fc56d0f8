//! Unpacks native libraries (`.so`, `.dll`, `.dylib`) out of
//! native-classifier jars into an installation's natives directory.
//!
//! The directory is wiped on every run, and files are copied flat
//! (by file name) since the runtime only searches one level deep.

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use kiln_core::{pt, IntoIoError, IoError};
use kiln_java_handler::compression::enclosed_join;
use thiserror::Error;

use crate::download::NativeJar;

fn is_metadata(name: &str) -> bool {
    name.starts_with("META-INF/")
}

/// Clears `natives_dir` and extracts every jar of `jars` into it.
/// Returns the number of files written.
///
/// # Errors
/// - a jar is missing (the install is broken)
/// - a jar is invalid, or an entry path escapes the directory
/// - files can't be written
pub async fn extract_natives(jars: &[NativeJar], natives_dir: &Path) -> Result<usize, NativesError> {
    let jars = jars.to_vec();
    let natives_dir = natives_dir.to_owned();
    tokio::task::spawn_blocking(move || extract_blocking(&jars, &natives_dir)).await?
}

fn extract_blocking(jars: &[NativeJar], natives_dir: &Path) -> Result<usize, NativesError> {
    if natives_dir.exists() {
        std::fs::remove_dir_all(natives_dir).path(natives_dir)?;
    }
    std::fs::create_dir_all(natives_dir).path(natives_dir)?;

    let mut written = 0;
    for jar in jars {
        if !jar.path.is_file() {
            return Err(NativesError::MissingJar(jar.path.clone()));
        }
        pt!("Extracting natives from {:?}", jar.path.file_name().unwrap_or_default());
        written += extract_jar(jar, natives_dir)?;
    }
    Ok(written)
}

fn extract_jar(jar: &NativeJar, natives_dir: &Path) -> Result<usize, NativesError> {
    let file = std::fs::File::open(&jar.path).path(&jar.path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_owned();
        if entry.is_dir()
            || is_metadata(&name)
            || jar.exclude.iter().any(|prefix| name.starts_with(prefix.as_str()))
        {
            continue;
        }

        let escape = || NativesError::PathEscape {
            jar: jar.path.clone(),
            entry: name.clone(),
        };
        let inside = enclosed_join(natives_dir, Path::new(&name)).map_err(|_| escape())?;
        let file_name = inside.file_name().ok_or_else(escape)?;
        let target = natives_dir.join(file_name);

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).path(&jar.path)?;
        std::fs::write(&target, &bytes).path(&target)?;
        written += 1;
    }
    Ok(written)
}

const NATIVES_ERR_PREFIX: &str = "while extracting natives:\n";

#[derive(Debug, Error)]
pub enum NativesError {
    #[error("{NATIVES_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{NATIVES_ERR_PREFIX}invalid jar: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{NATIVES_ERR_PREFIX}native jar {0:?} is missing, try reinstalling")]
    MissingJar(PathBuf),
    #[error("{NATIVES_ERR_PREFIX}entry {entry:?} of {jar:?} escapes the natives directory")]
    PathEscape { jar: PathBuf, entry: String },
    #[error("{NATIVES_ERR_PREFIX}extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
