use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
};

use futures::{future::BoxFuture, FutureExt};
use kiln_core::{
    config::Endpoints, download::Downloader, err, file_utils, info, no_window, pt, IntoIoError,
    LauncherDirs, Loader, ProgressSender,
};
use serde::Deserialize;

use crate::{LoaderError, ProfileMaterializer};

const INSTALLER_NAME: &str = "installer.jar";

/// Forge and NeoForge: the profile only exists after running
/// the loader's installer (`java -jar installer.jar --installClient <root>`),
/// which writes it to `versions/<id>/<id>.json` and puts its
/// patched jars into `libraries/`.
#[derive(Debug, Clone)]
pub struct InstallerProfile {
    loader: Loader,
    maven_url: String,
    promotions_url: String,
    endpoints: Endpoints,
    /// Runtime to run the installer with. `None` picks one
    /// (installing it if needed).
    java: Option<PathBuf>,
    downloader: Downloader,
}

#[derive(Deserialize)]
struct ForgePromotions {
    promos: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct NeoforgeVersions {
    versions: Vec<String>,
}

impl InstallerProfile {
    /// `None` unless `loader` is Forge or NeoForge.
    #[must_use]
    pub fn new(loader: Loader, endpoints: &Endpoints, java: Option<PathBuf>) -> Option<Self> {
        let maven_url = match loader {
            Loader::Forge => &endpoints.forge_maven,
            Loader::NeoForge => &endpoints.neoforge_maven,
            _ => return None,
        };
        Some(Self {
            loader,
            maven_url: maven_url.trim_end_matches('/').to_owned(),
            promotions_url: endpoints.forge_promotions.clone(),
            endpoints: endpoints.clone(),
            java,
            downloader: Downloader::new(),
        })
    }

    /// Downloads (the Java fallback included) go through `downloader`,
    /// and its cancellation stops the install before the installer runs.
    #[must_use]
    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    fn installer_url(&self, game_version: &str, loader_version: &str) -> String {
        let maven = &self.maven_url;
        if self.loader == Loader::NeoForge {
            format!("{maven}/releases/net/neoforged/neoforge/{loader_version}/neoforge-{loader_version}-installer.jar")
        } else {
            let full = format!("{game_version}-{loader_version}");
            format!("{maven}/net/minecraftforge/forge/{full}/forge-{full}-installer.jar")
        }
    }

    /// Id of the version the installer writes.
    fn installed_id(&self, game_version: &str, loader_version: &str) -> String {
        if self.loader == Loader::NeoForge {
            format!("neoforge-{loader_version}")
        } else {
            format!("{game_version}-forge-{loader_version}")
        }
    }

    async fn java(&self, game_version: &str, dirs: &LauncherDirs) -> Result<PathBuf, LoaderError> {
        if let Some(java) = &self.java {
            return Ok(java.clone());
        }
        let runtime = kiln_java_handler::find_or_install(
            kiln_java_handler::recommend(game_version),
            None,
            dirs,
            &self.endpoints,
            &self.downloader,
            &ProgressSender::none(),
        )
        .await?;
        Ok(runtime.path)
    }

    async fn run_installer(
        &self,
        game_version: &str,
        loader_version: &str,
        dirs: &LauncherDirs,
    ) -> Result<PathBuf, LoaderError> {
        let id = self.installed_id(game_version, loader_version);
        let json_path = dirs.version_dir(&id).join(format!("{id}.json"));
        if json_path.is_file() {
            pt!("{} {loader_version} already installed", self.loader);
            return Ok(json_path);
        }

        info!("Installing {} {loader_version} for {game_version}", self.loader);
        let java = self.java(game_version, dirs).await?;
        if self.downloader.is_cancelled() {
            return Err(LoaderError::Cancelled);
        }

        pt!("Downloading installer");
        let installer =
            file_utils::download_file_to_bytes(&self.installer_url(game_version, loader_version))
                .await?;
        let scratch = tempfile::tempdir().map_err(LoaderError::TempFile)?;
        let installer_path = scratch.path().join(INSTALLER_NAME);
        tokio::fs::write(&installer_path, &installer)
            .await
            .path(&installer_path)?;

        // The installer refuses to run without it.
        create_launcher_profiles(dirs.root()).await?;

        pt!("Running installer");
        let mut command = tokio::process::Command::new(&java);
        command
            .arg("-jar")
            .arg(&installer_path)
            .arg("--installClient")
            .arg(dirs.root())
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        no_window!(command);

        let output = command.output().await.path(&java)?;
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            err!("{} installer failed with code {code}", self.loader);
            return Err(LoaderError::Installer {
                loader: self.loader,
                code,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if json_path.is_file() {
            Ok(json_path)
        } else {
            Err(LoaderError::NoInstallJson(json_path))
        }
    }

    async fn fetch_latest(&self, game_version: &str) -> Result<String, LoaderError> {
        let no_version = || LoaderError::NoVersionFound {
            loader: self.loader,
            game_version: game_version.to_owned(),
        };

        let version = if self.loader == Loader::NeoForge {
            let url = format!(
                "{}/api/maven/versions/releases/net/neoforged/neoforge",
                self.maven_url
            );
            let list: NeoforgeVersions = file_utils::download_file_to_json(&url).await?;
            latest_neoforge(&list.versions, game_version).ok_or_else(no_version)?
        } else {
            let promotions: ForgePromotions =
                file_utils::download_file_to_json(&self.promotions_url).await?;
            promotions
                .promos
                .get(&format!("{game_version}-recommended"))
                .or_else(|| promotions.promos.get(&format!("{game_version}-latest")))
                .cloned()
                .ok_or_else(no_version)?
        };
        info!("Latest {} for {game_version}: {version}", self.loader);
        Ok(version)
    }
}

/// NeoForge versions drop the `1.` of the game version:
/// `1.20.4` -> `20.4.x`, `1.21` -> `21.0.x`.
/// Picks the newest stable one, or the newest beta if there's nothing else.
fn latest_neoforge(versions: &[String], game_version: &str) -> Option<String> {
    let rest = game_version.strip_prefix("1.")?;
    let prefix = if rest.contains('.') {
        format!("{rest}.")
    } else {
        format!("{rest}.0.")
    };

    let matching: Vec<&String> = versions.iter().filter(|v| v.starts_with(&prefix)).collect();
    matching
        .iter()
        .rev()
        .find(|v| !v.contains("-beta"))
        .or_else(|| matching.last())
        .map(|v| (*v).clone())
}

async fn create_launcher_profiles(root: &Path) -> Result<(), LoaderError> {
    let path = root.join("launcher_profiles.json");
    if !path.exists() {
        tokio::fs::create_dir_all(root).await.path(root)?;
        tokio::fs::write(&path, r#"{"profiles":{}}"#)
            .await
            .path(&path)?;
    }
    Ok(())
}

impl ProfileMaterializer for InstallerProfile {
    fn loader(&self) -> Loader {
        self.loader
    }

    fn materialize<'a>(
        &'a self,
        game_version: &'a str,
        loader_version: &'a str,
        dirs: &'a LauncherDirs,
    ) -> BoxFuture<'a, Result<PathBuf, LoaderError>> {
        self.run_installer(game_version, loader_version, dirs)
            .boxed()
    }

    fn latest_version<'a>(
        &'a self,
        game_version: &'a str,
    ) -> BoxFuture<'a, Result<String, LoaderError>> {
        self.fetch_latest(game_version).boxed()
    }
}
