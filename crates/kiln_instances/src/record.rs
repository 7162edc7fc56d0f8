use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use kiln_core::{
    config::LauncherConfig, file_utils, info, IntoIoError, IoError, JsonError, JsonFileError,
    LauncherDirs, Loader,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loader version placeholder, replaced by a concrete
/// version the first time the build is resolved.
pub const LATEST: &str = "latest";

const RECORD_FILE: &str = "config.json";

/// A build the user created.
///
/// Stored in `<launcher dir>/instances/<name>/config.json`.
///
/// Every `Option` override means "use the global setting"
/// when it's `None`; see [`InstallationRecord::effective`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstallationRecord {
    pub name: String,
    pub game_version: String,
    #[serde(default)]
    pub loader: Loader,
    /// `None` for vanilla. May be [`LATEST`] until resolved.
    #[serde(default)]
    pub loader_version: Option<String>,

    /// Path to a `java` executable for this build only.
    #[serde(default)]
    pub java_override: Option<String>,
    #[serde(default)]
    pub ram_in_mb: Option<usize>,
    #[serde(default)]
    pub java_args: Option<Vec<String>>,
    #[serde(default)]
    pub env_vars: Option<BTreeMap<String, String>>,
}

/// Directories belonging to one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// `instances/<name>`
    pub root: PathBuf,
    /// `instances/<name>/.minecraft`, the game's working directory.
    pub game_dir: PathBuf,
    /// `instances/<name>/natives`, rebuilt on every launch.
    pub natives_dir: PathBuf,
}

/// Launch settings after applying a record's overrides
/// on top of the global [`LauncherConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub java_override: Option<PathBuf>,
    pub ram_in_mb: usize,
    pub java_args: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub window_width: u32,
    pub window_height: u32,
}

impl InstallationRecord {
    #[must_use]
    pub fn new(name: &str, game_version: &str, loader: Loader, loader_version: Option<&str>) -> Self {
        Self {
            name: name.to_owned(),
            game_version: game_version.to_owned(),
            loader,
            loader_version: if loader.is_vanilla() {
                None
            } else {
                Some(loader_version.unwrap_or(LATEST).to_owned())
            },
            java_override: None,
            ram_in_mb: None,
            java_args: None,
            env_vars: None,
        }
    }

    #[must_use]
    pub fn layout(&self, dirs: &LauncherDirs) -> InstallLayout {
        let root = dirs.instance_dir(&self.name);
        InstallLayout {
            game_dir: root.join(".minecraft"),
            natives_dir: root.join("natives"),
            root,
        }
    }

    /// Whether the loader version still has to be looked up.
    #[must_use]
    pub fn needs_loader_version(&self) -> bool {
        !self.loader.is_vanilla()
            && self
                .loader_version
                .as_deref()
                .map_or(true, |v| v.is_empty() || v == LATEST)
    }

    /// Writes a new record and creates its directories.
    ///
    /// # Errors
    /// - the name is unusable as a directory name
    /// - an installation with this name exists
    /// - the files can't be written
    pub async fn create(&self, dirs: &LauncherDirs) -> Result<(), RecordError> {
        validate_name(&self.name)?;
        let layout = self.layout(dirs);
        if layout.root.exists() {
            return Err(RecordError::AlreadyExists(self.name.clone()));
        }
        info!("Creating installation {}", self.name);
        tokio::fs::create_dir_all(&layout.game_dir)
            .await
            .path(&layout.game_dir)?;
        self.save(dirs).await
    }

    /// # Errors
    /// - [`RecordError::NotFound`] if there's no such installation
    /// - the record can't be read or parsed
    pub async fn load(dirs: &LauncherDirs, name: &str) -> Result<Self, RecordError> {
        validate_name(name)?;
        let path = dirs.instance_dir(name).join(RECORD_FILE);
        if !path.is_file() {
            return Err(RecordError::NotFound(name.to_owned()));
        }
        Ok(file_utils::read_json_file(&path).await?)
    }

    /// # Errors
    /// If the record can't be serialized or written.
    pub async fn save(&self, dirs: &LauncherDirs) -> Result<(), RecordError> {
        let path = dirs.instance_dir(&self.name).join(RECORD_FILE);
        file_utils::write_json_file(&path, self).await?;
        Ok(())
    }

    /// Deletes an installation along with its whole directory.
    ///
    /// # Errors
    /// - [`RecordError::NotFound`] if there's no such installation
    /// - the directory can't be removed
    pub async fn delete(dirs: &LauncherDirs, name: &str) -> Result<(), RecordError> {
        validate_name(name)?;
        let dir = dirs.instance_dir(name);
        if !dir.is_dir() {
            return Err(RecordError::NotFound(name.to_owned()));
        }
        info!("Deleting installation {name}");
        tokio::fs::remove_dir_all(&dir).await.path(&dir)?;
        Ok(())
    }

    /// Names of all installations, sorted.
    ///
    /// # Errors
    /// If the instances directory exists but can't be read.
    pub async fn list(dirs: &LauncherDirs) -> Result<Vec<String>, RecordError> {
        let instances = dirs.instances();
        if !instances.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&instances).await.dir(&instances)?;
        while let Some(entry) = entries.next_entry().await.dir(&instances)? {
            if entry.path().join(RECORD_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Replaces a [`LATEST`] loader version with the concrete one
    /// it resolved to, and persists the record.
    ///
    /// # Errors
    /// If the record can't be saved.
    pub async fn set_resolved_loader_version(
        &mut self,
        dirs: &LauncherDirs,
        version: &str,
    ) -> Result<(), RecordError> {
        info!("{} {LATEST} resolved to {version}", self.loader);
        self.loader_version = Some(version.to_owned());
        self.save(dirs).await
    }

    #[must_use]
    pub fn effective(&self, config: &LauncherConfig) -> EffectiveSettings {
        let java_override = self
            .java_override
            .as_deref()
            .or(config.java_override.as_deref())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        EffectiveSettings {
            java_override,
            ram_in_mb: self.ram_in_mb.unwrap_or(config.ram_in_mb),
            java_args: self
                .java_args
                .clone()
                .unwrap_or_else(|| config.java_args.clone()),
            env_vars: self
                .env_vars
                .clone()
                .unwrap_or_else(|| config.env_vars.clone()),
            window_width: config.window_width,
            window_height: config.window_height,
        }
    }
}

fn validate_name(name: &str) -> Result<(), RecordError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || Path::new(name).is_absolute();
    if invalid {
        Err(RecordError::InvalidName(name.to_owned()))
    } else {
        Ok(())
    }
}

const RECORD_ERR_PREFIX: &str = "while managing installation:\n";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{RECORD_ERR_PREFIX}{0}")]
    Io(#[from] IoError),
    #[error("{RECORD_ERR_PREFIX}{0}")]
    Json(#[from] JsonError),
    #[error("{RECORD_ERR_PREFIX}installation {0:?} not found")]
    NotFound(String),
    #[error("{RECORD_ERR_PREFIX}installation {0:?} already exists")]
    AlreadyExists(String),
    #[error("{RECORD_ERR_PREFIX}{0:?} isn't a valid installation name")]
    InvalidName(String),
}

impl From<JsonFileError> for RecordError {
    fn from(value: JsonFileError) -> Self {
        match value {
            JsonFileError::Json(err) => Self::Json(err),
            JsonFileError::Io(err) => Self::Io(err),
        }
    }
}
