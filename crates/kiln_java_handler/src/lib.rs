//! Java runtimes for the game.
//!
//! - [`recommend`]: which major version a game version wants
//! - [`discover`]: what's already installed, on the system
//!   and in the launcher's own `java_installs` folder
//! - [`install`]: fetch an Eclipse Temurin build from the Adoptium releases
//! - [`find_or_install`]: all of the above, in order
//!
//! # Example
//! ```no_run
//! # async fn get() -> Result<(), kiln_java_handler::JavaInstallError> {
//! use kiln_core::{config::Endpoints, download::Downloader, LauncherDirs, ProgressSender};
//!
//! let dirs = LauncherDirs::locate()?;
//! let major = kiln_java_handler::recommend("1.20.1");
//! let runtime = kiln_java_handler::find_or_install(
//!     major,
//!     None,
//!     &dirs,
//!     &Endpoints::default(),
//!     &Downloader::new(),
//!     &ProgressSender::none(),
//! )
//! .await?;
//! println!("{}", runtime.path.display());
//! # Ok(())
//! # }
//! ```

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use kiln_core::{
    config::Endpoints,
    download::{DownloadError, Downloader},
    err, impl_3_errs_jri, info, IntoIoError, IoError, JsonError, LauncherDirs, Platform,
    ProgressSender, RequestError,
};
use serde::Serialize;
use thiserror::Error;

pub mod compression;
mod discover;
mod install;
mod recommend;

pub use discover::{discover, discover_managed, discover_system, probe, PROBE_TIMEOUT};
pub use install::install;
pub use recommend::{recommend, LEGACY_MAJOR, NEWEST_MAJOR};

pub(crate) const JAVA_BIN: &str = if cfg!(windows) { "java.exe" } else { "java" };

/// A Java runtime executable and what it reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeInfo {
    /// Absolute path to the `java` executable.
    pub path: PathBuf,
    pub major: u32,
    /// Full version string, e.g. `17.0.8` or `1.8.0_382`.
    pub version: String,
    pub vendor: String,
    /// 32 or 64.
    pub bits: u8,
    /// Installed by the launcher into `java_installs`, and so deletable by it.
    pub managed: bool,
}

impl Display for RuntimeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Java {} ({}, {}, {}-bit{}) at {}",
            self.major,
            self.version,
            self.vendor,
            self.bits,
            if self.managed { ", managed" } else { "" },
            self.path.display()
        )
    }
}

/// Runtimes found on this machine, split by who owns them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Runtimes {
    /// Installed by the user or the OS. Never deleted.
    pub system: Vec<RuntimeInfo>,
    /// Installed by the launcher.
    pub managed: Vec<RuntimeInfo>,
}

impl Runtimes {
    /// A runtime of exactly `major`, managed ones first.
    #[must_use]
    pub fn find_major(&self, major: u32) -> Option<&RuntimeInfo> {
        self.managed
            .iter()
            .chain(&self.system)
            .find(|runtime| runtime.major == major)
    }
}

/// Locates the `java` executable inside an unpacked runtime.
///
/// # Errors
/// [`JavaInstallError::NoJavaBinFound`] if there's none in the usual places.
pub fn get_java_binary(install_dir: &Path) -> Result<PathBuf, JavaInstallError> {
    let candidates = [
        PathBuf::from("bin").join(JAVA_BIN),
        PathBuf::from("Contents/Home/bin").join(JAVA_BIN),
        PathBuf::from("jre.bundle/Contents/Home/bin").join(JAVA_BIN),
    ];
    candidates
        .iter()
        .map(|relative| install_dir.join(relative))
        .find(|path| path.is_file())
        .ok_or_else(|| JavaInstallError::NoJavaBinFound(install_dir.to_owned()))
}

/// Picks a runtime for `major`:
/// 1) `java_override`, if given (not checked beyond a probe)
/// 2) an installed runtime of exactly `major`, managed first
/// 3) a fresh [`install`]
///
/// # Errors
/// If nothing fits and installing fails.
pub async fn find_or_install(
    major: u32,
    java_override: Option<&Path>,
    dirs: &LauncherDirs,
    endpoints: &Endpoints,
    downloader: &Downloader,
    progress: &ProgressSender,
) -> Result<RuntimeInfo, JavaInstallError> {
    if let Some(path) = java_override {
        if let Some(runtime) = probe(path).await {
            if runtime.major != major {
                err!(
                    "Java override is version {}, but {major} is recommended",
                    runtime.major
                );
            }
            return Ok(runtime);
        }
        err!("Couldn't probe Java override {path:?}, using it anyway");
        return Ok(RuntimeInfo {
            path: path.to_owned(),
            major,
            version: "unknown".to_owned(),
            vendor: "unknown".to_owned(),
            bits: Platform::current().arch.bits(),
            managed: false,
        });
    }

    let managed = discover_managed(dirs).await;
    if let Some(runtime) = managed.into_iter().find(|r| r.major == major) {
        return Ok(runtime);
    }
    let system = discover_system().await;
    if let Some(runtime) = system.into_iter().find(|r| r.major == major) {
        info!("Using system {runtime}");
        return Ok(runtime);
    }

    install(major, dirs, endpoints, downloader, progress).await
}

/// Deletes a launcher-managed runtime.
///
/// # Errors
/// - [`JavaInstallError::NotManaged`] for system runtimes
/// - if the files can't be removed
pub async fn uninstall(runtime: &RuntimeInfo, dirs: &LauncherDirs) -> Result<(), JavaInstallError> {
    let root = install::managed_root(dirs, &runtime.path)
        .filter(|_| runtime.managed)
        .ok_or_else(|| JavaInstallError::NotManaged(runtime.path.clone()))?;
    info!("Uninstalling Java {} at {root:?}", runtime.major);
    tokio::fs::remove_dir_all(&root).await.path(&root)?;
    Ok(())
}

const JAVA_INSTALL_ERR_PREFIX: &str = "while installing Java:\n";

#[derive(Debug, Error)]
pub enum JavaInstallError {
    #[error("{JAVA_INSTALL_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}{0}")]
    Download(#[from] DownloadError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}no Java {major} build available for {platform}")]
    NoDistribution { major: u32, platform: Platform },
    #[error("{JAVA_INSTALL_ERR_PREFIX}unsupported archive: {0}")]
    UnknownArchive(String),
    #[error("{JAVA_INSTALL_ERR_PREFIX}zip extract error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}couldn't extract java tar.gz: {0}")]
    TarGzExtract(std::io::Error),
    #[error("{JAVA_INSTALL_ERR_PREFIX}extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("{JAVA_INSTALL_ERR_PREFIX}couldn't find java binary in {0:?}")]
    NoJavaBinFound(PathBuf),
    #[error("{0:?} wasn't installed by the launcher, refusing to delete it")]
    NotManaged(PathBuf),
    #[error("{JAVA_INSTALL_ERR_PREFIX}cancelled")]
    Cancelled,
}

impl_3_errs_jri!(JavaInstallError, Json, Request, Io);
