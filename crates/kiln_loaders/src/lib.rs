//! Mod loader profiles.
//!
//! A loader build needs the loader's own version JSON
//! (extra libraries, a different main class, extra arguments)
//! next to the vanilla one. There are two ways of getting it:
//! - [`HttpProfile`]: Fabric and Quilt serve it from their meta API
//! - [`InstallerProfile`]: Forge and NeoForge only ship an installer jar,
//!   which has to be run to write the JSON (and patched jars) to disk
//!
//! Both implement [`ProfileMaterializer`], so the resolver
//! doesn't care which one it's talking to.

use std::path::PathBuf;

use futures::future::BoxFuture;
use kiln_core::{
    config::Endpoints, download::Downloader, impl_3_errs_jri, IoError, JsonError, LauncherDirs, Loader, RequestError,
};
use kiln_java_handler::JavaInstallError;
use thiserror::Error;

mod http_profile;
mod installer;

pub use http_profile::HttpProfile;
pub use installer::InstallerProfile;

/// Gets a loader's version JSON onto disk.
pub trait ProfileMaterializer: Send + Sync {
    fn loader(&self) -> Loader;

    /// Makes sure the loader's version JSON for this
    /// (game version, loader version) pair exists on disk,
    /// and returns its path.
    fn materialize<'a>(
        &'a self,
        game_version: &'a str,
        loader_version: &'a str,
        dirs: &'a LauncherDirs,
    ) -> BoxFuture<'a, Result<PathBuf, LoaderError>>;

    /// The version to use when the user asked for "latest".
    fn latest_version<'a>(&'a self, game_version: &'a str)
        -> BoxFuture<'a, Result<String, LoaderError>>;
}

/// The materializer for `loader`, or `None` for vanilla.
///
/// Forge and NeoForge may have to install a Java runtime
/// to run their installer; that goes through `downloader`.
#[must_use]
pub fn materializer_for(
    loader: Loader,
    endpoints: &Endpoints,
    java_override: Option<PathBuf>,
    downloader: &Downloader,
) -> Option<Box<dyn ProfileMaterializer>> {
    match loader {
        Loader::Vanilla => None,
        Loader::Fabric | Loader::Quilt => Some(Box::new(HttpProfile::new(loader, endpoints)?)),
        Loader::Forge | Loader::NeoForge => Some(Box::new(
            InstallerProfile::new(loader, endpoints, java_override)?
                .with_downloader(downloader.clone()),
        )),
    }
}

/// Id of the resolved descriptor of a build:
/// `1.20.1` for vanilla, `1.20.1-fabric-0.15.0` otherwise.
#[must_use]
pub fn descriptor_id(game_version: &str, loader: Loader, loader_version: &str) -> String {
    if loader.is_vanilla() {
        game_version.to_owned()
    } else {
        format!("{game_version}-{}-{loader_version}", loader.slug())
    }
}

const LOADER_ERR_PREFIX: &str = "while installing mod loader:\n";

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("{LOADER_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{LOADER_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{LOADER_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{LOADER_ERR_PREFIX}{0}")]
    JavaInstall(#[from] JavaInstallError),
    #[error("{LOADER_ERR_PREFIX}no {loader} version found for Minecraft {game_version}")]
    NoVersionFound {
        loader: Loader,
        game_version: String,
    },
    #[error("{LOADER_ERR_PREFIX}invalid {loader} profile {id}: {reason}")]
    InvalidProfile {
        loader: Loader,
        id: String,
        reason: String,
    },
    #[error("{LOADER_ERR_PREFIX}{loader} installer exited with code {code}\n\nSTDOUT = {stdout}\n\nSTDERR = {stderr}")]
    Installer {
        loader: Loader,
        /// -1 if killed by a signal
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("{LOADER_ERR_PREFIX}installer finished, but didn't write {0:?}")]
    NoInstallJson(PathBuf),
    #[error("{LOADER_ERR_PREFIX}couldn't create temporary directory: {0}")]
    TempFile(std::io::Error),
    #[error("{LOADER_ERR_PREFIX}cancelled")]
    Cancelled,
}

impl_3_errs_jri!(LoaderError, Json, Request, Io);

impl LoaderError {
    /// The HTTP status behind this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<kiln_core::StatusCode> {
        match self {
            LoaderError::Request(err) => err.status(),
            _ => None,
        }
    }

    /// The installer's exit code, if that's what failed.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LoaderError::Installer { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids() {
        assert_eq!(descriptor_id("1.20.1", Loader::Vanilla, ""), "1.20.1");
        assert_eq!(
            descriptor_id("1.20.1", Loader::Fabric, "0.15.0"),
            "1.20.1-fabric-0.15.0"
        );
        assert_eq!(
            descriptor_id("1.20.4", Loader::NeoForge, "20.4.237"),
            "1.20.4-neoforge-20.4.237"
        );
    }

    #[test]
    fn vanilla_has_no_materializer() {
        let endpoints = Endpoints::default();
        let downloader = Downloader::new();
        assert!(materializer_for(Loader::Vanilla, &endpoints, None, &downloader).is_none());
        assert_eq!(
            materializer_for(Loader::Quilt, &endpoints, None, &downloader)
                .unwrap()
                .loader(),
            Loader::Quilt
        );
        assert_eq!(
            materializer_for(Loader::NeoForge, &endpoints, None, &downloader)
                .unwrap()
                .loader(),
            Loader::NeoForge
        );
    }
}
