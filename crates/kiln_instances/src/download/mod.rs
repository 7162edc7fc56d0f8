//! Getting every file of a resolved version onto disk.
//!
//! # Order
//! 1) Client jar, logging config, asset index
//! 2) Libraries (main jars and native jars)
//! 3) Asset objects, then the virtual copy for legacy indexes
//!
//! Libraries and assets live in shared directories, so two builds
//! of the same version reuse each other's files; the download engine
//! skips whatever is already there.

use std::{path::Path, time::Duration};

use kiln_core::{
    config::LauncherConfig,
    download::{DownloadError, DownloadReport, DownloadTask, Downloader},
    err, file_utils, info,
    json::{AssetIndex, VersionDescriptor},
    pt, IntoIoError, IoError, JsonError, JsonFileError, LauncherDirs, Phase, Platform,
    ProgressSender,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod plan;

pub use plan::{client_jar_path, plan, plan_assets, DownloadPlan, NativeJar};

const LOCK_FILE: &str = "download.lock";
const LOCK_CONTENTS: &str = "If you see this, the asset downloading hasn't finished. This will be deleted once finished.";

/// What [`acquire`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireReport {
    pub files: DownloadReport,
    /// Objects copied into the virtual assets directory.
    pub virtual_copies: usize,
}

impl AcquireReport {
    fn add(&mut self, report: DownloadReport) {
        self.files.downloaded += report.downloaded;
        self.files.already_present += report.already_present;
        self.files.skipped += report.skipped;
    }
}

/// A [`Downloader`] using the retry delay from `config`.
#[must_use]
pub fn downloader(config: &LauncherConfig, cancel: CancellationToken) -> Downloader {
    Downloader::new()
        .with_retry_delay(Duration::from_millis(config.downloads.retry_delay_ms))
        .with_cancellation(cancel)
}

fn with_attempts(tasks: Vec<DownloadTask>, attempts: u8) -> Vec<DownloadTask> {
    tasks
        .into_iter()
        .map(|task| task.with_attempts(attempts))
        .collect()
}

/// Downloads everything `descriptor` needs on `platform`.
///
/// # Errors
/// - a critical file fails all of its attempts
/// - the asset index is invalid
/// - files can't be written
/// - [`DownloadError::Cancelled`] if `downloader` was cancelled
pub async fn acquire(
    descriptor: &VersionDescriptor,
    platform: Platform,
    dirs: &LauncherDirs,
    config: &LauncherConfig,
    downloader: &Downloader,
    progress: &ProgressSender,
) -> Result<AcquireReport, AcquireError> {
    let settings = &config.downloads;
    let plan = plan::plan(descriptor, platform, dirs);
    let mut report = AcquireReport::default();
    info!("Downloading files of {}", descriptor.id);

    pt!("Client jar");
    report.add(
        downloader
            .execute(
                &with_attempts(plan.client_tasks(), settings.attempts),
                settings.library_jobs(),
                Phase::ClientJar,
                progress,
            )
            .await?,
    );

    pt!("Libraries ({})", plan.libraries.len());
    report.add(
        downloader
            .execute(
                &with_attempts(plan.libraries, settings.attempts),
                settings.library_jobs(),
                Phase::Libraries,
                progress,
            )
            .await?,
    );

    let index: AssetIndex = file_utils::read_json_file(&plan.asset_index.path).await?;
    let assets = with_attempts(
        plan::plan_assets(&index, dirs, &config.endpoints.resources),
        settings.attempts,
    );
    pt!("Assets ({})", assets.len());

    let assets_dir = dirs.assets();
    tokio::fs::create_dir_all(&assets_dir)
        .await
        .path(&assets_dir)?;
    let lock_path = assets_dir.join(LOCK_FILE);
    if lock_path.exists() {
        err!("Asset downloading previously interrupted?");
    }
    tokio::fs::write(&lock_path, LOCK_CONTENTS)
        .await
        .path(&lock_path)?;

    report.add(
        downloader
            .execute(&assets, settings.asset_jobs(), Phase::Assets, progress)
            .await?,
    );
    tokio::fs::remove_file(&lock_path).await.path(&lock_path)?;

    if index.is_legacy() {
        let target = dirs.virtual_assets(&descriptor.asset_index.id);
        pt!("Copying legacy assets to {target:?}");
        report.virtual_copies = copy_virtual(&index, &dirs.asset_objects(), &target).await?;
    }

    progress.finished();
    info!(
        "Finished downloading {} ({} new, {} present, {} skipped)",
        descriptor.id, report.files.downloaded, report.files.already_present, report.files.skipped
    );
    Ok(report)
}

/// Copies objects under their logical names, for games
/// that read assets by name instead of by hash.
async fn copy_virtual(index: &AssetIndex, objects: &Path, target: &Path) -> Result<usize, IoError> {
    let mut copied = 0;
    for (name, object) in &index.objects {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
        {
            return Err(IoError::DirEscapeAttack(relative.to_owned()));
        }
        let destination = target.join(relative);
        let existing = tokio::fs::metadata(&destination).await.ok();
        if existing.is_some_and(|meta| meta.len() == object.size) {
            continue;
        }
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.path(parent)?;
        }
        let source = objects.join(object.object_path());
        tokio::fs::copy(&source, &destination)
            .await
            .path(&source)?;
        copied += 1;
    }
    Ok(copied)
}

const ACQUIRE_ERR_PREFIX: &str = "while downloading game files:\n";

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("{ACQUIRE_ERR_PREFIX}{0}")]
    Download(#[from] DownloadError),
    #[error("{ACQUIRE_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{ACQUIRE_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
}

impl From<JsonFileError> for AcquireError {
    fn from(value: JsonFileError) -> Self {
        match value {
            JsonFileError::Json(err) => Self::Json(err),
            JsonFileError::Io(err) => Self::Io(err),
        }
    }
}

impl AcquireError {
    #[must_use]
    pub fn status(&self) -> Option<kiln_core::StatusCode> {
        match self {
            AcquireError::Download(err) => err.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AcquireError::Download(DownloadError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use kiln_core::{
        config::Endpoints,
        json::VersionJson,
        testing::{Route, TestServer},
        Arch, Os,
    };
    use serde_json::json;

    use super::*;
    use crate::resolve::normalize::{self, tests::vanilla_json};

    const LINUX: Platform = Platform::new(Os::Linux, Arch::X86_64);
    const SOUND: &[u8] = b"not really an ogg";

    fn sound_hash() -> String {
        sha1_smol::Sha1::from(SOUND).digest().to_string()
    }

    async fn setup(virtual_index: bool) -> (TestServer, VersionDescriptor, LauncherConfig) {
        let hash = sound_hash();
        let server = TestServer::start(Vec::<(&str, Route)>::new()).await;
        server.set("/client.jar", Route::ok("client"));
        server.set("/client-1.12.xml", Route::ok("<Configuration/>"));
        server.set(
            "/libraries/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
            Route::ok("brigadier"),
        );
        server.set(
            "/indexes/5.json",
            Route::json(&json!({
                "virtual": virtual_index,
                "objects": {
                    "minecraft/sounds/a.ogg": {"hash": hash, "size": SOUND.len()},
                    "minecraft/sounds/b.ogg": {"hash": hash, "size": SOUND.len()}
                }
            })),
        );
        server.set(
            &format!("/resources/{}/{hash}", &hash[..2]),
            Route::ok(SOUND),
        );

        let json: VersionJson =
            serde_json::from_value(vanilla_json("1.20.1", &server.base())).unwrap();
        let descriptor = normalize::vanilla(&json, "https://libraries.minecraft.net/").unwrap();
        let config = LauncherConfig {
            endpoints: Endpoints::all_at(&server.base()),
            ..Default::default()
        };
        (server, descriptor, config)
    }

    #[tokio::test]
    async fn fetches_everything_once() {
        let (server, descriptor, config) = setup(false).await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let downloader = downloader(&config, CancellationToken::new());
        let (tx, rx) = std::sync::mpsc::channel();
        let progress = ProgressSender::new(tx);

        let report = acquire(&descriptor, LINUX, &dirs, &config, &downloader, &progress)
            .await
            .unwrap();
        assert_eq!(report.files.downloaded, 5);
        assert_eq!(report.virtual_copies, 0);
        assert!(client_jar_path(&dirs, "1.20.1").is_file());
        assert!(dirs
            .asset_objects()
            .join(&sound_hash()[..2])
            .join(sound_hash())
            .is_file());
        assert!(!dirs.assets().join(LOCK_FILE).exists());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last().map(|e| e.phase), Some(Phase::Done));
        assert!(events.windows(2).all(|w| w[0].fraction <= w[1].fraction));

        let hits = server.hits();
        let again = acquire(&descriptor, LINUX, &dirs, &config, &downloader, &ProgressSender::none())
            .await
            .unwrap();
        assert_eq!(again.files.downloaded, 0);
        assert_eq!(again.files.already_present, 5);
        assert_eq!(server.hits(), hits);
    }

    #[tokio::test]
    async fn legacy_index_gets_virtual_copy() {
        let (_server, descriptor, config) = setup(true).await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());

        let report = acquire(
            &descriptor,
            LINUX,
            &dirs,
            &config,
            &downloader(&config, CancellationToken::new()),
            &ProgressSender::none(),
        )
        .await
        .unwrap();
        assert_eq!(report.virtual_copies, 2);
        let copy = dirs.virtual_assets("5").join("minecraft/sounds/b.ogg");
        assert_eq!(std::fs::read(copy).unwrap(), SOUND);
    }

    #[tokio::test]
    async fn missing_library_fails_with_status() {
        let (server, descriptor, mut config) = setup(false).await;
        server.set(
            "/libraries/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
            Route::status(404),
        );
        config.downloads.attempts = 1;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());

        let err = acquire(
            &descriptor,
            LINUX,
            &dirs,
            &config,
            &downloader(&config, CancellationToken::new()),
            &ProgressSender::none(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let (server, descriptor, config) = setup(false).await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let token = CancellationToken::new();
        token.cancel();

        let err = acquire(
            &descriptor,
            LINUX,
            &dirs,
            &config,
            &downloader(&config, token),
            &ProgressSender::none(),
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn escaping_asset_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = AssetIndex::default();
        index.objects.insert(
            "../../evil".to_owned(),
            kiln_core::json::AssetObject {
                hash: sound_hash(),
                size: 1,
            },
        );
        let result = copy_virtual(&index, dir.path(), &dir.path().join("virtual")).await;
        assert!(matches!(result, Err(IoError::DirEscapeAttack(_))));
    }
}
