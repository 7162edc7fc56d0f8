//! Installing Eclipse Temurin builds from the Adoptium GitHub releases.

use std::path::{Path, PathBuf};

use kiln_core::{
    config::Endpoints,
    download::{DownloadTask, Downloader, TaskOutcome},
    file_utils, info, Arch, IntoIoError, LauncherDirs, Os, Phase, Platform, ProgressSender,
};
use serde::Deserialize;

use crate::{
    compression::{extract_tar_gz, extract_zip, flatten_single_top_level},
    discover, get_java_binary, JavaInstallError, RuntimeInfo,
};

const LOCK_FILE: &str = "install.lock";
const STEPS: usize = 4;

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct GithubRelease {
    pub tag_name: String,
    pub assets: Vec<GithubAsset>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    fn of(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

fn os_token(os: Os) -> &'static str {
    match os {
        Os::Windows => "windows",
        Os::Osx => "mac",
        Os::Linux | Os::FreeBsd => "linux",
    }
}

fn arch_token(arch: Arch) -> &'static str {
    match arch {
        Arch::X86_64 => "x64",
        Arch::X86 => "x86-32",
        Arch::Aarch64 => "aarch64",
        Arch::Arm => "arm",
    }
}

/// Picks the archive for `platform` out of a release,
/// preferring a JRE over a full JDK.
///
/// Apple Silicon falls back to the x64 build
/// (run through Rosetta) when there's no native one.
pub(crate) fn select_asset(assets: &[GithubAsset], platform: Platform) -> Option<&GithubAsset> {
    let find = |arch: Arch| {
        let token = format!("_{}_{}_", arch_token(arch), os_token(platform.os));
        ["-jre_", "-jdk_"].iter().find_map(|kind| {
            assets.iter().find(|asset| {
                asset.name.contains(kind)
                    && asset.name.contains(&token)
                    && ArchiveKind::of(&asset.name).is_some()
            })
        })
    };

    find(platform.arch).or_else(|| {
        (platform.os == Os::Osx && platform.arch == Arch::Aarch64)
            .then(|| find(Arch::X86_64))
            .flatten()
    })
}

/// Downloads and unpacks Java `major` into `java_installs/<major>`,
/// replacing whatever was there.
///
/// While this runs, an `install.lock` sits in the install directory;
/// if it's still there next time, the install gets redone.
///
/// # Errors
/// - the release feed can't be reached or has no build for this platform
/// - the download fails
/// - the archive is invalid or tries to escape the install directory
/// - no `java` binary ends up in the install
/// - [`JavaInstallError::Cancelled`] if the downloader was cancelled
pub async fn install(
    major: u32,
    dirs: &LauncherDirs,
    endpoints: &Endpoints,
    downloader: &Downloader,
    progress: &ProgressSender,
) -> Result<RuntimeInfo, JavaInstallError> {
    let platform = Platform::current();
    info!("Installing Java {major} ({platform})");

    let install_dir = dirs.java_installs().join(major.to_string());
    if install_dir.exists() {
        tokio::fs::remove_dir_all(&install_dir)
            .await
            .path(&install_dir)?;
    }
    tokio::fs::create_dir_all(&install_dir)
        .await
        .path(&install_dir)?;
    let lock_file = install_dir.join(LOCK_FILE);
    tokio::fs::write(&lock_file, "If you see this, java hasn't finished installing.")
        .await
        .path(&lock_file)?;

    progress.report(Phase::Java, 0, STEPS, Some("Finding latest release".to_owned()));
    let release_url = format!(
        "{}/temurin{major}-binaries/releases/latest",
        endpoints.java_releases.trim_end_matches('/')
    );
    let release: GithubRelease = file_utils::download_file_to_json(&release_url).await?;
    let asset = select_asset(&release.assets, platform)
        .ok_or(JavaInstallError::NoDistribution { major, platform })?;
    let kind = ArchiveKind::of(&asset.name)
        .ok_or_else(|| JavaInstallError::UnknownArchive(asset.name.clone()))?;

    progress.report(Phase::Java, 1, STEPS, Some(format!("Downloading {}", asset.name)));
    let archive_path = install_dir.join(&asset.name);
    let task = DownloadTask::new(&archive_path, &asset.browser_download_url, &asset.name)
        .with_size(asset.size);
    if downloader.fetch(&task).await? == TaskOutcome::Cancelled {
        // The lock stays, so the next attempt starts over.
        info!("Java {major} install cancelled");
        return Err(JavaInstallError::Cancelled);
    }

    progress.report(Phase::Java, 2, STEPS, Some("Extracting".to_owned()));
    let archive = tokio::fs::read(&archive_path).await.path(&archive_path)?;
    tokio::fs::remove_file(&archive_path)
        .await
        .path(&archive_path)?;
    let extract_dir = install_dir.clone();
    tokio::task::spawn_blocking(move || -> Result<(), JavaInstallError> {
        match kind {
            ArchiveKind::TarGz => extract_tar_gz(&archive, &extract_dir)?,
            ArchiveKind::Zip => extract_zip(&archive, &extract_dir)?,
        }
        flatten_single_top_level(&extract_dir, &[LOCK_FILE])?;
        Ok(())
    })
    .await??;

    #[cfg(unix)]
    mark_binaries_executable(&install_dir).await?;

    progress.report(Phase::Java, 3, STEPS, Some("Checking runtime".to_owned()));
    let java = get_java_binary(&install_dir)?;
    tokio::fs::remove_file(&lock_file).await.path(&lock_file)?;

    let runtime = match discover::probe(&java).await {
        Some(mut runtime) => {
            runtime.managed = true;
            runtime
        }
        None => RuntimeInfo {
            path: java,
            major,
            version: release.tag_name.clone(),
            vendor: "Eclipse Adoptium".to_owned(),
            bits: platform.arch.bits(),
            managed: true,
        },
    };

    progress.report(Phase::Java, STEPS, STEPS, None);
    info!("Finished installing Java {major} ({})", release.tag_name);
    Ok(runtime)
}

#[cfg(unix)]
async fn mark_binaries_executable(install_dir: &Path) -> Result<(), JavaInstallError> {
    let Ok(java) = get_java_binary(install_dir) else {
        return Ok(());
    };
    let Some(bin) = java.parent() else {
        return Ok(());
    };
    let mut entries = tokio::fs::read_dir(bin).await.dir(bin)?;
    while let Some(entry) = entries.next_entry().await.dir(bin)? {
        let path = entry.path();
        if path.is_file() {
            file_utils::set_executable(&path).await?;
        }
    }
    Ok(())
}

/// The root of the managed install a runtime lives in,
/// or `None` if it isn't inside `java_installs`.
pub(crate) fn managed_root(dirs: &LauncherDirs, java: &Path) -> Option<PathBuf> {
    let installs = dirs.java_installs();
    let installs = std::fs::canonicalize(&installs).unwrap_or(installs);
    let relative = java.strip_prefix(&installs).ok()?;
    let first = relative.components().next()?;
    Some(installs.join(first))
}
