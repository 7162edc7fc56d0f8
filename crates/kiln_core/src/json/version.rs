use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    rules::{self, Rule},
    Platform,
};

/// A version JSON as served upstream.
///
/// The same shape is used by vanilla versions, Fabric/Quilt
/// loader profiles and the JSON a Forge installer writes,
/// so nearly everything is optional. Loader profiles only carry
/// `id`, `inheritsFrom`, `mainClass`, `libraries` and `arguments`.
#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VersionJson {
    /// Name of the version.
    pub id: String,
    /// Loader profiles: the vanilla version this patches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inheritsFrom: Option<String>,
    /// The class in the jar that has the main function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainClass: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryJson>,
    /// The list of command line arguments.
    ///
    /// Used in new versions, compared to `minecraftArguments` used in old versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    /// The complete game argument line, space separated.
    ///
    /// Used in old versions, compared to `arguments` used in new versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraftArguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assetIndex: Option<AssetIndexInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javaVersion: Option<JavaVersionInfo>,
    /// Details regarding console logging with log4j.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,
    /// Type of version, such as `release` or `old_beta`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentTemplate>,
    #[serde(default)]
    pub jvm: Vec<ArgumentTemplate>,
}

/// One entry of `arguments.game` / `arguments.jvm`.
///
/// ```json
/// "--username",
/// { "rules": [{ "action": "allow", "os": { "name": "osx" } }], "value": ["-XstartOnFirstThread"] }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentTemplate {
    Literal(String),
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl ArgumentValue {
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            ArgumentValue::One(s) => std::slice::from_ref(s),
            ArgumentValue::Many(v) => v,
        }
    }
}

impl ArgumentTemplate {
    #[must_use]
    pub fn literal(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }

    /// The raw (unsubstituted) tokens of this entry,
    /// or nothing if its rules exclude `platform`.
    #[must_use]
    pub fn tokens(&self, platform: Platform) -> &[String] {
        match self {
            ArgumentTemplate::Literal(s) => std::slice::from_ref(s),
            ArgumentTemplate::Conditional { rules, value } => {
                if rules::applies(rules, platform) {
                    value.as_slice()
                } else {
                    &[]
                }
            }
        }
    }

    /// Splits an old-style `minecraftArguments` line.
    #[must_use]
    pub fn from_legacy_line(line: &str) -> Vec<Self> {
        line.split_whitespace().map(Self::literal).collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LibraryJson {
    /// Maven coordinate, `group:artifact:version[:classifier][@ext]`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// Maven repository base (loader profiles).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// OS name to native classifier, may contain `${arch}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<LibraryExtract>,
    /// Loader profiles sometimes put the checksum here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, ArtifactJson>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArtifactJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LibraryExtract {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetIndexInfo {
    pub id: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub totalSize: u64,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Downloads {
    pub client: Download,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Download {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JavaVersionInfo {
    #[serde(default)]
    pub component: Option<String>,
    pub majorVersion: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Logging {
    #[serde(default)]
    pub client: Option<LoggingClient>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingClient {
    /// e.g. `-Dlog4j.configurationFile=${path}`
    pub argument: String,
    pub file: LoggingFile,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingFile {
    pub id: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}
