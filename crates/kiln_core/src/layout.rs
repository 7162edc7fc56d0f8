use std::path::{Path, PathBuf};

use crate::{file_utils, IoError};

/// Where everything lives inside the launcher directory.
///
/// ```txt
/// <root>/
///   config.json
///   compat_overrides.json   (optional)
///   versions/<id>/descriptor.json
///   libraries/              (maven layout, shared)
///   assets/indexes/ objects/<hh>/<hash> log_configs/ virtual/<index>/
///   instances/<name>/config.json .minecraft/ natives/
///   java_installs/<major>/
///   logs/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherDirs {
    root: PathBuf,
}

impl LauncherDirs {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Uses [`file_utils::get_launcher_dir`].
    ///
    /// # Errors
    /// If the launcher directory can't be found or created.
    pub fn locate() -> Result<Self, IoError> {
        Ok(Self::new(file_utils::get_launcher_dir()?))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    #[must_use]
    pub fn compat_overrides_file(&self) -> PathBuf {
        self.root.join("compat_overrides.json")
    }

    #[must_use]
    pub fn versions(&self) -> PathBuf {
        self.root.join("versions")
    }

    #[must_use]
    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions().join(id)
    }

    #[must_use]
    pub fn libraries(&self) -> PathBuf {
        self.root.join("libraries")
    }

    #[must_use]
    pub fn assets(&self) -> PathBuf {
        self.root.join("assets")
    }

    #[must_use]
    pub fn asset_indexes(&self) -> PathBuf {
        self.assets().join("indexes")
    }

    #[must_use]
    pub fn asset_objects(&self) -> PathBuf {
        self.assets().join("objects")
    }

    #[must_use]
    pub fn log_configs(&self) -> PathBuf {
        self.assets().join("log_configs")
    }

    #[must_use]
    pub fn virtual_assets(&self, index_id: &str) -> PathBuf {
        self.assets().join("virtual").join(index_id)
    }

    #[must_use]
    pub fn instances(&self) -> PathBuf {
        self.root.join("instances")
    }

    #[must_use]
    pub fn instance_dir(&self, name: &str) -> PathBuf {
        self.instances().join(name)
    }

    #[must_use]
    pub fn java_installs(&self) -> PathBuf {
        self.root.join("java_installs")
    }
}
