//! Global launcher settings, stored in `<launcher dir>/config.json`.
//!
//! Every field has a default, so an old or partial file
//! still loads. Per-build overrides live in the installation
//! record and fall back to these values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{err, file_utils, IntoIoError, JsonFileError, LauncherDirs};

pub const DEFAULT_RAM_MB: usize = 2048;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    /// Player name used for offline launches.
    pub username: String,
    /// Runtime executable to use for every build
    /// (unless a build overrides it). `None` picks automatically.
    pub java_override: Option<String>,
    pub ram_in_mb: usize,
    pub java_args: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub window_width: u32,
    pub window_height: u32,
    pub downloads: DownloadSettings,
    pub endpoints: Endpoints,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            java_override: None,
            ram_in_mb: DEFAULT_RAM_MB,
            java_args: Vec::new(),
            env_vars: BTreeMap::new(),
            window_width: 854,
            window_height: 480,
            downloads: DownloadSettings::default(),
            endpoints: Endpoints::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadSettings {
    /// Attempts per file before giving up.
    pub attempts: u8,
    /// Pause between attempts.
    pub retry_delay_ms: u64,
    /// Concurrent library downloads, `0` = derive from core count.
    pub library_jobs: usize,
    /// Concurrent asset downloads, `0` = derive from core count.
    pub asset_jobs: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 1000,
            library_jobs: 0,
            asset_jobs: 0,
        }
    }
}

impl DownloadSettings {
    fn cores() -> usize {
        std::thread::available_parallelism().map_or(4, std::num::NonZero::get)
    }

    /// Library jars are few and large: 2 per core, 4 to 16.
    #[must_use]
    pub fn library_jobs(&self) -> usize {
        if self.library_jobs > 0 {
            self.library_jobs
        } else {
            (Self::cores() * 2).clamp(4, 16)
        }
    }

    /// Asset objects are many and tiny: 8 per core, 16 to 64.
    #[must_use]
    pub fn asset_jobs(&self) -> usize {
        if self.asset_jobs > 0 {
            self.asset_jobs
        } else {
            (Self::cores() * 8).clamp(16, 64)
        }
    }
}

/// Upstream servers. Point these at a mirror (or a local
/// test server) to change where everything is fetched from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub version_manifest: String,
    /// Base for library jars without an explicit URL.
    pub libraries: String,
    /// Base of the content-addressed asset store.
    pub resources: String,
    pub fabric_meta: String,
    pub quilt_meta: String,
    pub forge_maven: String,
    pub forge_promotions: String,
    pub neoforge_maven: String,
    /// GitHub API base for the Adoptium release repos.
    pub java_releases: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json"
                .to_owned(),
            libraries: "https://libraries.minecraft.net/".to_owned(),
            resources: "https://resources.download.minecraft.net".to_owned(),
            fabric_meta: "https://meta.fabricmc.net/v2".to_owned(),
            quilt_meta: "https://meta.quiltmc.org/v3".to_owned(),
            forge_maven: "https://maven.minecraftforge.net".to_owned(),
            forge_promotions:
                "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json"
                    .to_owned(),
            neoforge_maven: "https://maven.neoforged.net".to_owned(),
            java_releases: "https://api.github.com/repos/adoptium".to_owned(),
        }
    }
}

impl Endpoints {
    /// Every endpoint rooted at `base`, for tests and single-host mirrors.
    #[must_use]
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            version_manifest: format!("{base}/mc/game/version_manifest_v2.json"),
            libraries: format!("{base}/libraries/"),
            resources: format!("{base}/resources"),
            fabric_meta: format!("{base}/fabric/v2"),
            quilt_meta: format!("{base}/quilt/v3"),
            forge_maven: format!("{base}/forge"),
            forge_promotions: format!("{base}/forge/promotions_slim.json"),
            neoforge_maven: format!("{base}/neoforge"),
            java_releases: format!("{base}/adoptium"),
        }
    }
}

impl LauncherConfig {
    /// Loads the config, writing a default one if it's missing.
    /// A corrupt config is reported and replaced by the defaults
    /// (the broken file is left alone).
    ///
    /// # Errors
    /// If a missing config can't be created.
    pub async fn load(dirs: &LauncherDirs) -> Result<Self, JsonFileError> {
        let config_path = dirs.config_file();
        if !config_path.exists() {
            return Self::create(dirs).await;
        }

        let config = tokio::fs::read_to_string(&config_path)
            .await
            .path(&config_path)?;
        match serde_json::from_str(&config) {
            Ok(config) => Ok(config),
            Err(error) => {
                err!("Invalid launcher config at {config_path:?}, using defaults: {error}");
                Ok(Self::default())
            }
        }
    }

    /// # Errors
    /// If the config can't be serialized or written.
    pub async fn save(&self, dirs: &LauncherDirs) -> Result<(), JsonFileError> {
        file_utils::write_json_file(&dirs.config_file(), self).await
    }

    async fn create(dirs: &LauncherDirs) -> Result<Self, JsonFileError> {
        let config = Self::default();
        config.save(dirs).await?;
        Ok(config)
    }
}
