use serde::{Deserialize, Serialize};

use crate::{file_utils, JsonDownloadError};

/// The official version manifest
/// (list of all versions and where their version JSON lives).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Manifest {
    pub latest: Latest,
    pub versions: Vec<ManifestVersion>,
}

impl Manifest {
    /// # Errors
    /// If the manifest can't be downloaded or parsed.
    pub async fn download(url: &str) -> Result<Manifest, JsonDownloadError> {
        file_utils::download_file_to_json(url).await
    }

    /// Looks up a version by its name.
    /// This searches for an *exact match*.
    #[must_use]
    pub fn find_name(&self, name: &str) -> Option<&ManifestVersion> {
        self.versions.iter().find(|n| n.id == name)
    }

    #[must_use]
    pub fn get_latest_release(&self) -> Option<&ManifestVersion> {
        self.find_name(&self.latest.release)
    }

    #[must_use]
    pub fn get_latest_snapshot(&self) -> Option<&ManifestVersion> {
        self.find_name(&self.latest.snapshot)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Latest {
    pub release: String,
    pub snapshot: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ManifestVersion {
    pub id: String,
    /// `release`, `snapshot`, `old_beta` or `old_alpha`.
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}
