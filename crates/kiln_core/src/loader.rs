use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// The mod loader a build runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Loader {
    #[default]
    Vanilla,
    Fabric,
    Quilt,
    Forge,
    #[serde(alias = "Neoforge")]
    NeoForge,
}

impl Loader {
    /// Lowercase name, used in descriptor ids
    /// (`1.20.1-fabric-0.15.0`) and on the command line.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Loader::Vanilla => "vanilla",
            Loader::Fabric => "fabric",
            Loader::Quilt => "quilt",
            Loader::Forge => "forge",
            Loader::NeoForge => "neoforge",
        }
    }

    #[must_use]
    pub const fn is_vanilla(self) -> bool {
        matches!(self, Loader::Vanilla)
    }
}

impl Display for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Loader::Vanilla => "Vanilla",
                Loader::Fabric => "Fabric",
                Loader::Quilt => "Quilt",
                Loader::Forge => "Forge",
                Loader::NeoForge => "NeoForge",
            }
        )
    }
}

impl FromStr for Loader {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vanilla" | "none" => Ok(Loader::Vanilla),
            "fabric" => Ok(Loader::Fabric),
            "quilt" => Ok(Loader::Quilt),
            "forge" => Ok(Loader::Forge),
            "neoforge" => Ok(Loader::NeoForge),
            loader => Err(format!("unknown loader: {loader}")),
        }
    }
}
