use std::{
    io::{Cursor, Read},
    path::{Component, Path, PathBuf},
};

use flate2::read::GzDecoder;
use kiln_core::{IntoIoError, IoError};
use tar::Archive;

use crate::JavaInstallError;

/// Joins an archive entry path onto `root`,
/// rejecting anything that would land outside of it
/// (`../`, absolute paths, drive prefixes).
///
/// # Errors
/// [`IoError::DirEscapeAttack`] for escaping paths.
pub fn enclosed_join(root: &Path, entry: &Path) -> Result<PathBuf, IoError> {
    let mut clean = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Err(IoError::DirEscapeAttack(entry.to_owned()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(IoError::DirEscapeAttack(entry.to_owned()));
            }
        }
    }
    Ok(root.join(clean))
}

/// Extracts a `.zip` file from a `&[u8]` buffer into the given directory.
///
/// # Errors
/// - the zip is invalid
/// - an entry tries to escape `output_dir`
/// - files can't be written
pub fn extract_zip(archive: &[u8], output_dir: &Path) -> Result<(), JavaInstallError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let full_path = enclosed_join(output_dir, Path::new(file.name()))?;

        if file.is_dir() {
            std::fs::create_dir_all(&full_path).path(&full_path)?;
            continue;
        }
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).path(parent)?;
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).path(&full_path)?;
        std::fs::write(&full_path, &bytes).path(&full_path)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&full_path, std::fs::Permissions::from_mode(mode))
                .path(&full_path)?;
        }
    }

    Ok(())
}

/// Extracts a `.tar.gz` file from a `&[u8]` buffer into the given directory.
///
/// # Errors
/// - the archive is invalid
/// - an entry tries to escape `output_dir`
/// - files can't be written
pub fn extract_tar_gz(archive: &[u8], output_dir: &Path) -> Result<(), JavaInstallError> {
    // For extracting the `.gz`
    let decoder = GzDecoder::new(Cursor::new(archive));
    // For extracting the `.tar`
    let mut tar = Archive::new(decoder);

    for entry in tar.entries().map_err(JavaInstallError::TarGzExtract)? {
        let mut entry = entry.map_err(JavaInstallError::TarGzExtract)?;
        let entry_path = entry
            .path()
            .map_err(JavaInstallError::TarGzExtract)?
            .into_owned();
        enclosed_join(output_dir, &entry_path)?;
        check_link_target(&entry, &entry_path, output_dir)?;

        // `unpack_in` also refuses to write through a symlinked parent.
        let unpacked = entry
            .unpack_in(output_dir)
            .map_err(JavaInstallError::TarGzExtract)?;
        if !unpacked {
            return Err(IoError::DirEscapeAttack(entry_path).into());
        }
    }

    Ok(())
}

/// Symlinks are resolved relative to their own directory,
/// hard links relative to the archive root. Either way
/// the target has to stay inside `output_dir`.
fn check_link_target<R: Read>(
    entry: &tar::Entry<'_, R>,
    entry_path: &Path,
    output_dir: &Path,
) -> Result<(), JavaInstallError> {
    let kind = entry.header().entry_type();
    if !kind.is_symlink() && !kind.is_hard_link() {
        return Ok(());
    }
    let Some(target) = entry.link_name().map_err(JavaInstallError::TarGzExtract)? else {
        return Ok(());
    };
    let base = if kind.is_symlink() {
        entry_path.parent().unwrap_or(Path::new(""))
    } else {
        Path::new("")
    };
    enclosed_join(output_dir, &base.join(&target)).map_err(|_| {
        JavaInstallError::Io(IoError::DirEscapeAttack(entry_path.to_owned()))
    })?;
    Ok(())
}

/// If `dir` holds exactly one directory (ignoring `ignore`),
/// moves that directory's contents up into `dir` and removes it.
///
/// `jdk-17.0.8+7/bin/java` becomes `bin/java`.
///
/// # Errors
/// If the directory can't be read or the files can't be moved.
pub fn flatten_single_top_level(dir: &Path, ignore: &[&str]) -> Result<bool, IoError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).dir(dir)? {
        let entry = entry.dir(dir)?;
        let name = entry.file_name();
        if ignore.iter().any(|n| name == *n) {
            continue;
        }
        entries.push(entry);
    }

    let [only] = entries.as_slice() else {
        return Ok(false);
    };
    if !only.file_type().dir(dir)?.is_dir() {
        return Ok(false);
    }

    // Renamed first, in case it contains an entry with its own name.
    let wrapper = dir.join(".flatten-tmp");
    std::fs::rename(only.path(), &wrapper).path(&wrapper)?;
    for entry in std::fs::read_dir(&wrapper).dir(&wrapper)? {
        let entry = entry.dir(&wrapper)?;
        let target = dir.join(entry.file_name());
        std::fs::rename(entry.path(), &target).path(&target)?;
    }
    std::fs::remove_dir(&wrapper).path(&wrapper)?;
    Ok(true)
}
