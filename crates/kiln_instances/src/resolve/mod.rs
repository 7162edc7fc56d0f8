//! Turns a requested build into a [`VersionDescriptor`].
//!
//! ```text
//! Uncached -> Fetching -> Merging -> Resolved
//!        \         \          \
//!         `---------`----------`--> Failed
//! ```
//!
//! A descriptor cached at `versions/<id>/descriptor.json` short-circuits
//! straight to `Resolved`. Nothing is written until the whole
//! descriptor is ready, so a failed or cancelled resolve never
//! leaves a partial one behind.

use std::{fmt::Display, path::PathBuf};

use kiln_core::{
    config::{Endpoints, LauncherConfig},
    download::Downloader,
    err, file_utils, impl_3_errs_jri, info,
    json::{Manifest, VersionDescriptor, VersionJson},
    pt, IntoIoError, IntoJsonError, IoError, JsonError, LauncherDirs, Loader, Platform, RequestError,
};
use kiln_java_handler::JavaInstallError;
use kiln_loaders::{descriptor_id, LoaderError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

mod compat;
pub(crate) mod normalize;

pub use compat::{CompatOverride, CompatOverrides};

use crate::record::{InstallationRecord, RecordError};

const DESCRIPTOR_FILE: &str = "descriptor.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Uncached,
    Fetching,
    Merging,
    Resolved,
    Failed,
}

impl Display for ResolveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResolveState::Uncached => "uncached",
                ResolveState::Fetching => "fetching",
                ResolveState::Merging => "merging",
                ResolveState::Resolved => "resolved",
                ResolveState::Failed => "failed",
            }
        )
    }
}

pub struct Resolver {
    dirs: LauncherDirs,
    endpoints: Endpoints,
    platform: Platform,
    overrides: CompatOverrides,
    /// Runtime for running loader installers.
    java: Option<PathBuf>,
    /// Shared with loader installers, which may have to fetch a runtime.
    downloader: Downloader,
    state: ResolveState,
}

impl Resolver {
    #[must_use]
    pub fn new(dirs: &LauncherDirs, endpoints: &Endpoints, platform: Platform) -> Self {
        Self {
            dirs: dirs.clone(),
            endpoints: endpoints.clone(),
            platform,
            overrides: CompatOverrides::builtin(),
            java: None,
            downloader: Downloader::new(),
            state: ResolveState::Uncached,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: CompatOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn with_java(mut self, java: Option<PathBuf>) -> Self {
        self.java = java;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.downloader = self.downloader.with_cancellation(token);
        self
    }

    /// Replaces the downloader, its cancellation token included.
    #[must_use]
    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    #[must_use]
    pub fn state(&self) -> ResolveState {
        self.state
    }

    fn enter(&mut self, state: ResolveState) {
        pt!("Resolver: {} -> {state}", self.state);
        self.state = state;
    }

    /// Resolves `game_version` (plus a loader, unless vanilla)
    /// into a descriptor, using the cache when possible.
    ///
    /// `loader_version` must be concrete here; see [`resolve()`]
    /// for looking up "latest".
    ///
    /// # Errors
    /// - the game version isn't in the manifest
    /// - a version JSON or loader profile is missing or invalid
    /// - a loader installer exits with a non-zero code
    /// - a request fails (the error carries the status)
    /// - [`ResolveError::Cancelled`]
    pub async fn resolve(
        &mut self,
        game_version: &str,
        loader: Loader,
        loader_version: &str,
    ) -> Result<VersionDescriptor, ResolveError> {
        self.state = ResolveState::Uncached;
        match self.resolve_inner(game_version, loader, loader_version).await {
            Ok(descriptor) => {
                self.enter(ResolveState::Resolved);
                Ok(descriptor)
            }
            Err(error) => {
                self.enter(ResolveState::Failed);
                err!("Couldn't resolve {game_version}: {error}");
                Err(error)
            }
        }
    }

    async fn resolve_inner(
        &mut self,
        game_version: &str,
        loader: Loader,
        loader_version: &str,
    ) -> Result<VersionDescriptor, ResolveError> {
        let id = descriptor_id(game_version, loader, loader_version);
        let cache_path = self.dirs.version_dir(&id).join(DESCRIPTOR_FILE);

        if let Some(descriptor) = read_cached(&cache_path).await {
            info!("Using cached descriptor for {id}");
            return Ok(descriptor);
        }

        self.enter(ResolveState::Fetching);
        info!("Resolving {id}");
        let vanilla_json = self.fetch_vanilla(game_version).await?;
        self.check_cancelled()?;

        let profile = if loader.is_vanilla() {
            None
        } else {
            Some(self.fetch_profile(game_version, loader, loader_version).await?)
        };
        self.check_cancelled()?;

        self.enter(ResolveState::Merging);
        let repository = &self.endpoints.libraries;
        let mut descriptor = normalize::vanilla(&vanilla_json, repository)?;
        if let Some(profile) = &profile {
            descriptor = normalize::merge(descriptor, profile, &id, repository)?;
        }
        self.overrides.apply(&mut descriptor, self.platform);

        self.check_cancelled()?;
        file_utils::write_json_file(&cache_path, &descriptor).await?;
        Ok(descriptor)
    }

    async fn fetch_vanilla(&self, game_version: &str) -> Result<VersionJson, ResolveError> {
        pt!("Downloading version manifest");
        let manifest = Manifest::download(&self.endpoints.version_manifest).await?;
        let entry = manifest
            .find_name(game_version)
            .ok_or_else(|| ResolveError::VersionNotFound(game_version.to_owned()))?;

        pt!("Downloading version JSON of {game_version}");
        let text = file_utils::download_file_to_string(&entry.url).await?;
        let json: VersionJson = serde_json::from_str(&text).json(text.clone())?;

        // Loader installers expect the vanilla JSON next to theirs.
        let dir = self.dirs.version_dir(game_version);
        tokio::fs::create_dir_all(&dir).await.path(&dir)?;
        let path = dir.join(format!("{game_version}.json"));
        tokio::fs::write(&path, &text).await.path(&path)?;

        Ok(json)
    }

    async fn fetch_profile(
        &self,
        game_version: &str,
        loader: Loader,
        loader_version: &str,
    ) -> Result<VersionJson, ResolveError> {
        let materializer = kiln_loaders::materializer_for(
            loader,
            &self.endpoints,
            self.java.clone(),
            &self.downloader,
        )
        .ok_or(ResolveError::NoMaterializer(loader))?;
        let path = materializer
            .materialize(game_version, loader_version, &self.dirs)
            .await
            .map_err(|error| match error {
                LoaderError::Cancelled
                | LoaderError::JavaInstall(JavaInstallError::Cancelled) => ResolveError::Cancelled,
                error => error.into(),
            })?;
        Ok(file_utils::read_json_file(&path).await?)
    }

    fn check_cancelled(&self) -> Result<(), ResolveError> {
        if self.downloader.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolves an installation.
///
/// A loader version of [`crate::LATEST`] is looked up first, and
/// the concrete version is saved into the record so later resolves
/// (and launches) stay on it.
///
/// # Errors
/// See [`Resolver::resolve`]. Also fails if the compatibility
/// overrides file is invalid or the record can't be saved.
pub async fn resolve(
    record: &mut InstallationRecord,
    dirs: &LauncherDirs,
    config: &LauncherConfig,
    cancel: CancellationToken,
) -> Result<VersionDescriptor, ResolveError> {
    let endpoints = &config.endpoints;
    let java = record.effective(config).java_override;
    let downloader = crate::download::downloader(config, cancel);

    if record.needs_loader_version() {
        let materializer =
            kiln_loaders::materializer_for(record.loader, endpoints, java.clone(), &downloader)
                .ok_or(ResolveError::NoMaterializer(record.loader))?;
        let version = materializer.latest_version(&record.game_version).await?;
        record.set_resolved_loader_version(dirs, &version).await?;
    }

    let overrides = CompatOverrides::load(dirs).await?;
    let mut resolver = Resolver::new(dirs, endpoints, Platform::current())
        .with_overrides(overrides)
        .with_java(java)
        .with_downloader(downloader);

    let loader_version = record.loader_version.clone().unwrap_or_default();
    resolver
        .resolve(&record.game_version, record.loader, &loader_version)
        .await
}

/// A cached descriptor, or `None` if there's none or it's unreadable.
async fn read_cached(path: &std::path::Path) -> Option<VersionDescriptor> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&text) {
        Ok(descriptor) => Some(descriptor),
        Err(error) => {
            err!("Ignoring invalid cached descriptor {path:?}: {error}");
            None
        }
    }
}

const RESOLVE_ERR_PREFIX: &str = "while resolving version:\n";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{RESOLVE_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{RESOLVE_ERR_PREFIX}{0}")]
    Request(#[from] RequestError),
    #[error("{RESOLVE_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{RESOLVE_ERR_PREFIX}{0}")]
    Loader(#[from] LoaderError),
    #[error("{RESOLVE_ERR_PREFIX}{0}")]
    Record(#[from] RecordError),
    #[error("{RESOLVE_ERR_PREFIX}version {0:?} not found in the version manifest")]
    VersionNotFound(String),
    #[error("{RESOLVE_ERR_PREFIX}invalid version JSON {id}: {reason}")]
    InvalidVersionJson { id: String, reason: String },
    #[error("{RESOLVE_ERR_PREFIX}{0} has no profile source")]
    NoMaterializer(Loader),
    #[error("{RESOLVE_ERR_PREFIX}cancelled")]
    Cancelled,
}

impl_3_errs_jri!(ResolveError, Json, Request, Io);

impl ResolveError {
    /// The HTTP status of the request that failed, if any.
    #[must_use]
    pub fn status(&self) -> Option<kiln_core::StatusCode> {
        match self {
            ResolveError::Request(err) => err.status(),
            ResolveError::Loader(err) => err.status(),
            _ => None,
        }
    }

    /// The exit code of a loader installer that failed, if any.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ResolveError::Loader(err) => err.exit_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use kiln_core::{
        testing::{Route, TestServer},
        Arch, Os,
    };
    use serde_json::json;

    use super::{normalize::tests::vanilla_json, *};

    const LINUX: Platform = Platform::new(Os::Linux, Arch::X86_64);

    async fn server() -> TestServer {
        let server = TestServer::start(Vec::<(&str, Route)>::new()).await;
        server.set(
            "/mc/game/version_manifest_v2.json",
            Route::json(&json!({
                "latest": {"release": "1.20.1", "snapshot": "1.20.1"},
                "versions": [{"id": "1.20.1", "type": "release", "url": server.url("/v/1.20.1.json")}]
            })),
        );
        server.set(
            "/v/1.20.1.json",
            Route::json(&vanilla_json("1.20.1", &server.base())),
        );
        server.set(
            "/fabric/v2/versions/loader/1.20.1/0.15.0/profile/json",
            Route::json(&json!({
                "id": "fabric-loader-0.15.0-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "arguments": {"game": [], "jvm": []},
                "libraries": [{"name": "net.fabricmc:fabric-loader:0.15.0", "url": server.url("/maven/")}]
            })),
        );
        server
    }

    #[tokio::test]
    async fn vanilla_resolves_and_caches() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let endpoints = Endpoints::all_at(&server.base());

        let mut resolver = Resolver::new(&dirs, &endpoints, LINUX);
        let descriptor = resolver.resolve("1.20.1", Loader::Vanilla, "").await.unwrap();
        assert_eq!(resolver.state(), ResolveState::Resolved);
        assert_eq!(descriptor.id, "1.20.1");
        assert_eq!(descriptor.main_class, "net.minecraft.client.main.Main");
        assert!(dirs.version_dir("1.20.1").join(DESCRIPTOR_FILE).is_file());
        assert!(dirs.version_dir("1.20.1").join("1.20.1.json").is_file());

        let plan = crate::download::plan(&descriptor, LINUX, &dirs);
        assert!(plan
            .classpath
            .last()
            .is_some_and(|jar| jar.ends_with("1.20.1.jar")));

        let hits = server.hits();
        let cached = resolver.resolve("1.20.1", Loader::Vanilla, "").await.unwrap();
        assert_eq!(cached, descriptor);
        assert_eq!(server.hits(), hits);
    }

    #[tokio::test]
    async fn fabric_main_class_wins() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let endpoints = Endpoints::all_at(&server.base());

        let mut resolver = Resolver::new(&dirs, &endpoints, LINUX);
        let descriptor = resolver
            .resolve("1.20.1", Loader::Fabric, "0.15.0")
            .await
            .unwrap();
        assert_eq!(descriptor.id, "1.20.1-fabric-0.15.0");
        assert_eq!(
            descriptor.main_class,
            "net.fabricmc.loader.impl.launch.knot.KnotClient"
        );
        assert_eq!(
            descriptor.libraries[0].coordinate.to_string(),
            "net.fabricmc:fabric-loader:0.15.0"
        );
        assert!(dirs
            .version_dir("1.20.1-fabric-0.15.0")
            .join(DESCRIPTOR_FILE)
            .is_file());
    }

    #[tokio::test]
    async fn invalid_cache_is_a_miss() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let cache = dirs.version_dir("1.20.1").join(DESCRIPTOR_FILE);
        std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
        std::fs::write(&cache, "{ truncated").unwrap();

        let mut resolver = Resolver::new(&dirs, &Endpoints::all_at(&server.base()), LINUX);
        resolver.resolve("1.20.1", Loader::Vanilla, "").await.unwrap();
        assert!(server.hits() > 0);
        let text = std::fs::read_to_string(&cache).unwrap();
        assert!(serde_json::from_str::<VersionDescriptor>(&text).is_ok());
    }

    #[tokio::test]
    async fn unknown_version_fails() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let mut resolver = Resolver::new(&dirs, &Endpoints::all_at(&server.base()), LINUX);

        let err = resolver
            .resolve("9.99", Loader::Vanilla, "")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::VersionNotFound(ref v) if v == "9.99"));
        assert_eq!(resolver.state(), ResolveState::Failed);
    }

    #[tokio::test]
    async fn missing_profile_carries_status() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let mut resolver = Resolver::new(&dirs, &Endpoints::all_at(&server.base()), LINUX);

        let err = resolver
            .resolve("1.20.1", Loader::Fabric, "0.0.1")
            .await
            .unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
        assert!(!dirs
            .version_dir("1.20.1-fabric-0.0.1")
            .join(DESCRIPTOR_FILE)
            .exists());
    }

    #[tokio::test]
    async fn latest_loader_is_pinned_in_record() {
        let server = server().await;
        server.set(
            "/fabric/v2/versions/loader/1.20.1",
            Route::json(&json!([
                {"loader": {"version": "0.15.0", "stable": true}},
                {"loader": {"version": "0.14.9", "stable": true}}
            ])),
        );
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let config = LauncherConfig {
            endpoints: Endpoints::all_at(&server.base()),
            ..Default::default()
        };

        let mut record = InstallationRecord::new("modded", "1.20.1", Loader::Fabric, None);
        record.create(&dirs).await.unwrap();
        let descriptor = resolve(&mut record, &dirs, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(descriptor.id, "1.20.1-fabric-0.15.0");
        assert_eq!(record.loader_version.as_deref(), Some("0.15.0"));
        let saved = InstallationRecord::load(&dirs, "modded").await.unwrap();
        assert_eq!(saved.loader_version.as_deref(), Some("0.15.0"));
    }

    #[tokio::test]
    async fn cancelled_resolve_writes_nothing() {
        let server = server().await;
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        let token = CancellationToken::new();
        token.cancel();

        let mut resolver = Resolver::new(&dirs, &Endpoints::all_at(&server.base()), LINUX)
            .with_cancellation(token);
        assert!(matches!(
            resolver.resolve("1.20.1", Loader::Vanilla, "").await,
            Err(ResolveError::Cancelled)
        ));
        assert!(!dirs.version_dir("1.20.1").join(DESCRIPTOR_FILE).exists());
    }

    #[test]
    fn loader_installs_share_the_cancellation() {
        let dirs = LauncherDirs::new("/tmp/kiln-unused");
        let token = CancellationToken::new();
        let resolver =
            Resolver::new(&dirs, &Endpoints::default(), LINUX).with_cancellation(token.clone());
        assert!(!resolver.downloader.is_cancelled());
        token.cancel();
        assert!(resolver.downloader.is_cancelled());
    }
}
