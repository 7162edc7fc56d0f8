use std::path::PathBuf;

use futures::{future::BoxFuture, FutureExt};
use kiln_core::{
    config::Endpoints, file_utils, info, json::VersionJson, pt, IntoIoError, IntoJsonError,
    LauncherDirs, Loader,
};
use serde::Deserialize;

use crate::{descriptor_id, LoaderError, ProfileMaterializer};

/// Fabric and Quilt: the loader profile is a plain
/// version JSON served by the loader's meta API.
#[derive(Debug, Clone)]
pub struct HttpProfile {
    loader: Loader,
    meta_url: String,
}

#[derive(Deserialize, Debug)]
struct LoaderListEntry {
    loader: LoaderListVersion,
}

#[derive(Deserialize, Debug)]
struct LoaderListVersion {
    version: String,
    /// Quilt doesn't send this.
    #[serde(default)]
    stable: Option<bool>,
}

impl HttpProfile {
    /// `None` unless `loader` is Fabric or Quilt.
    #[must_use]
    pub fn new(loader: Loader, endpoints: &Endpoints) -> Option<Self> {
        let meta_url = match loader {
            Loader::Fabric => &endpoints.fabric_meta,
            Loader::Quilt => &endpoints.quilt_meta,
            _ => return None,
        };
        Some(Self {
            loader,
            meta_url: meta_url.trim_end_matches('/').to_owned(),
        })
    }

    fn profile_url(&self, game_version: &str, loader_version: &str) -> String {
        format!(
            "{}/versions/loader/{game_version}/{loader_version}/profile/json",
            self.meta_url
        )
    }

    async fn fetch_profile(
        &self,
        game_version: &str,
        loader_version: &str,
        dirs: &LauncherDirs,
    ) -> Result<PathBuf, LoaderError> {
        let id = descriptor_id(game_version, self.loader, loader_version);
        pt!("Downloading {} profile {id}", self.loader);

        let text = file_utils::download_file_to_string(&self.profile_url(game_version, loader_version))
            .await?;
        let profile: VersionJson = serde_json::from_str(&text).json(text.clone())?;

        let invalid = |reason: &str| LoaderError::InvalidProfile {
            loader: self.loader,
            id: id.clone(),
            reason: reason.to_owned(),
        };
        if profile.mainClass.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("missing mainClass"));
        }
        if let Some(parent) = &profile.inheritsFrom {
            if parent != game_version {
                return Err(invalid(&format!(
                    "inherits from {parent}, expected {game_version}"
                )));
            }
        }

        let dir = dirs.version_dir(&id);
        tokio::fs::create_dir_all(&dir).await.path(&dir)?;
        let path = dir.join("profile.json");
        tokio::fs::write(&path, &text).await.path(&path)?;
        Ok(path)
    }

    async fn fetch_latest(&self, game_version: &str) -> Result<String, LoaderError> {
        let url = format!("{}/versions/loader/{game_version}", self.meta_url);
        let list: Vec<LoaderListEntry> = file_utils::download_file_to_json(&url).await?;

        let version = list
            .iter()
            .find(|entry| entry.loader.stable.unwrap_or(true))
            .or_else(|| list.first())
            .map(|entry| entry.loader.version.clone())
            .ok_or_else(|| LoaderError::NoVersionFound {
                loader: self.loader,
                game_version: game_version.to_owned(),
            })?;
        info!("Latest {} for {game_version}: {version}", self.loader);
        Ok(version)
    }
}

impl ProfileMaterializer for HttpProfile {
    fn loader(&self) -> Loader {
        self.loader
    }

    fn materialize<'a>(
        &'a self,
        game_version: &'a str,
        loader_version: &'a str,
        dirs: &'a LauncherDirs,
    ) -> BoxFuture<'a, Result<PathBuf, LoaderError>> {
        self.fetch_profile(game_version, loader_version, dirs)
            .boxed()
    }

    fn latest_version<'a>(
        &'a self,
        game_version: &'a str,
    ) -> BoxFuture<'a, Result<String, LoaderError>> {
        self.fetch_latest(game_version).boxed()
    }
}

#[cfg(test)]
mod tests {
    use kiln_core::testing::{Route, TestServer};
    use serde_json::json;

    use super::*;

    fn fabric_profile() -> serde_json::Value {
        json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]},
            "libraries": [
                {"name": "net.fabricmc:intermediary:1.20.1", "url": "https://maven.fabricmc.net/"},
                {"name": "net.fabricmc:fabric-loader:0.15.0", "url": "https://maven.fabricmc.net/"}
            ]
        })
    }

    #[tokio::test]
    async fn writes_profile_to_version_dir() {
        let server = TestServer::start([(
            "/fabric/v2/versions/loader/1.20.1/0.15.0/profile/json",
            Route::json(&fabric_profile()),
        )])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let fabric = HttpProfile::new(Loader::Fabric, &Endpoints::all_at(&server.base())).unwrap();

        let path = fabric.materialize("1.20.1", "0.15.0", &dirs).await.unwrap();
        assert_eq!(
            path,
            dirs.version_dir("1.20.1-fabric-0.15.0").join("profile.json")
        );
        let written: VersionJson =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.libraries.len(), 2);
    }

    #[tokio::test]
    async fn profile_without_main_class_is_invalid() {
        let server = TestServer::start([(
            "/quilt/v3/versions/loader/1.20.1/0.23.0/profile/json",
            Route::json(&json!({"id": "quilt-loader-0.23.0-1.20.1", "libraries": []})),
        )])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let quilt = HttpProfile::new(Loader::Quilt, &Endpoints::all_at(&server.base())).unwrap();

        let err = quilt.materialize("1.20.1", "0.23.0", &dirs).await.unwrap_err();
        assert!(matches!(err, LoaderError::InvalidProfile { .. }), "{err}");
        assert!(!dirs.version_dir("1.20.1-quilt-0.23.0").exists());
    }

    #[tokio::test]
    async fn missing_profile_reports_status() {
        let server = TestServer::start(Vec::<(&str, Route)>::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let fabric = HttpProfile::new(Loader::Fabric, &Endpoints::all_at(&server.base())).unwrap();

        let err = fabric.materialize("1.20.1", "9.9.9", &dirs).await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    }

    #[tokio::test]
    async fn latest_skips_unstable() {
        let server = TestServer::start([(
            "/fabric/v2/versions/loader/1.20.1",
            Route::json(&json!([
                {"loader": {"version": "0.16.0-beta.1", "stable": false}},
                {"loader": {"version": "0.15.11", "stable": true}},
                {"loader": {"version": "0.15.10", "stable": true}}
            ])),
        )])
        .await;
        let fabric = HttpProfile::new(Loader::Fabric, &Endpoints::all_at(&server.base())).unwrap();
        assert_eq!(fabric.latest_version("1.20.1").await.unwrap(), "0.15.11");
    }

    #[tokio::test]
    async fn no_versions_is_an_error() {
        let server = TestServer::start([(
            "/quilt/v3/versions/loader/1.2.5",
            Route::json(&json!([])),
        )])
        .await;
        let quilt = HttpProfile::new(Loader::Quilt, &Endpoints::all_at(&server.base())).unwrap();
        assert!(matches!(
            quilt.latest_version("1.2.5").await,
            Err(LoaderError::NoVersionFound { .. })
        ));
    }
}
