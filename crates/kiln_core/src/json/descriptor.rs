//! The normalized, merged description of what a runnable install needs.
//!
//! Produced once by the resolver (vanilla version JSON + optional
//! loader profile + platform compatibility overrides), cached as
//! `versions/<id>/descriptor.json` and never mutated afterwards.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::version::{ArgumentTemplate, ArtifactJson, LibraryJson};
use crate::{rules::Rule, Platform};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    /// `1.20.1` for vanilla, `1.20.1-fabric-0.15.0` for loader builds.
    pub id: String,
    pub game_version: String,
    /// `release`, `snapshot`, `old_beta`...
    pub kind: String,
    pub main_class: String,
    /// Classpath order. Loader libraries come first.
    pub libraries: Vec<LibraryRef>,
    pub asset_index: AssetIndexRef,
    pub client: RemoteFile,
    pub jvm_arguments: Vec<ArgumentTemplate>,
    pub game_arguments: Vec<ArgumentTemplate>,
    /// Runtime major version the version JSON asks for.
    #[serde(default)]
    pub java_version: Option<u32>,
    #[serde(default)]
    pub logging: Option<LoggingRef>,
}

/// A file with a known location and (optionally) known size/checksum.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    /// 0 = unknown
    #[serde(default)]
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetIndexRef {
    pub id: String,
    pub file: RemoteFile,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingRef {
    /// JVM argument template with a `${path}` token.
    pub argument: String,
    /// File name under `assets/log_configs`.
    pub id: String,
    pub file: RemoteFile,
}

/// A library jar: `path` is relative to the libraries directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl Artifact {
    fn from_json(json: &ArtifactJson, fallback_path: String) -> Self {
        Self {
            path: json.path.clone().unwrap_or(fallback_path),
            url: json.url.clone(),
            sha1: json.sha1.clone(),
            size: json.size.unwrap_or_default(),
        }
    }

    /// The repository base this artifact was served from, if its URL ends with its path.
    fn repository(&self) -> Option<&str> {
        self.url.strip_suffix(&self.path)
    }
}

/// Where the main jar of a library comes from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MainJar {
    /// The version JSON names the exact file.
    Explicit(Artifact),
    /// Built from the coordinate: `<repository><maven path>`.
    Derived { repository: String },
    /// Natives-only entry, nothing goes on the classpath.
    Absent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LibraryRef {
    pub coordinate: Coordinate,
    pub main: MainJar,
    /// OS name to native classifier (may contain `${arch}`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub natives: BTreeMap<String, String>,
    /// Classifier to explicit artifact.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifiers: BTreeMap<String, Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    /// Path prefixes to skip when extracting natives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract_exclude: Vec<String>,
}

impl LibraryRef {
    /// Normalizes a library entry of a version JSON.
    /// `default_repository` is used when the entry names no file and no repository.
    ///
    /// # Errors
    /// If the `name` isn't a valid maven coordinate.
    pub fn from_json(json: &LibraryJson, default_repository: &str) -> Result<Self, String> {
        let coordinate: Coordinate = json.name.parse()?;

        let artifact = json.downloads.as_ref().and_then(|d| d.artifact.as_ref());
        let classifiers: BTreeMap<String, Artifact> = json
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .map(|c| {
                c.iter()
                    .map(|(name, artifact)| {
                        let path = coordinate.with_classifier(name).path();
                        (name.clone(), Artifact::from_json(artifact, path))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let main = if let Some(artifact) = artifact {
            let mut artifact = Artifact::from_json(artifact, coordinate.path());
            if artifact.sha1.is_none() {
                artifact.sha1.clone_from(&json.sha1);
            }
            MainJar::Explicit(artifact)
        } else if json.downloads.is_some() && !classifiers.is_empty() {
            MainJar::Absent
        } else {
            MainJar::Derived {
                repository: json
                    .url
                    .clone()
                    .unwrap_or_else(|| default_repository.to_owned()),
            }
        };

        Ok(Self {
            coordinate,
            main,
            natives: json.natives.clone().unwrap_or_default(),
            classifiers,
            rules: json.rules.clone().unwrap_or_default(),
            extract_exclude: json
                .extract
                .as_ref()
                .map(|e| e.exclude.clone())
                .unwrap_or_default(),
        })
    }

    /// A plain maven library fetched from `repository`.
    #[must_use]
    pub fn maven(coordinate: Coordinate, repository: &str) -> Self {
        Self {
            coordinate,
            main: MainJar::Derived {
                repository: repository.to_owned(),
            },
            natives: BTreeMap::new(),
            classifiers: BTreeMap::new(),
            rules: Vec::new(),
            extract_exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn main_artifact(&self) -> Option<Artifact> {
        match &self.main {
            MainJar::Explicit(artifact) => Some(artifact.clone()),
            MainJar::Derived { repository } => {
                let path = self.coordinate.path();
                Some(Artifact {
                    url: join_url(repository, &path),
                    path,
                    sha1: None,
                    size: 0,
                })
            }
            MainJar::Absent => None,
        }
    }

    /// The native classifier for `platform`, with `${arch}` filled in.
    #[must_use]
    pub fn native_classifier(&self, platform: Platform) -> Option<String> {
        platform
            .os
            .aliases()
            .iter()
            .find_map(|name| self.natives.get(*name))
            .map(|classifier| classifier.replace("${arch}", &platform.arch_token()))
    }

    /// The native-classifier jar to download for `platform`, if this library has one.
    #[must_use]
    pub fn native_artifact(&self, platform: Platform) -> Option<Artifact> {
        let classifier = self.native_classifier(platform)?;
        if let Some(artifact) = self.classifiers.get(&classifier) {
            return Some(artifact.clone());
        }

        let repository = match &self.main {
            MainJar::Derived { repository } => repository.as_str(),
            MainJar::Explicit(artifact) => artifact.repository()?,
            MainJar::Absent => return None,
        };
        let path = self.coordinate.with_classifier(&classifier).path();
        Some(Artifact {
            url: join_url(repository, &path),
            path,
            sha1: None,
            size: 0,
        })
    }

    /// Whether the main jar itself is a natives bundle
    /// (`org.lwjgl:lwjgl:3.3.1:natives-linux`).
    #[must_use]
    pub fn is_natives_jar(&self) -> bool {
        self.coordinate
            .classifier
            .as_deref()
            .is_some_and(|c| c.starts_with("natives-"))
    }
}

fn join_url(base: &str, path: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// A maven coordinate, `group:artifact:version[:classifier][@extension]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl Coordinate {
    /// `group:artifact`, the part shared by every version.
    #[must_use]
    pub fn family(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    #[must_use]
    pub fn with_classifier(&self, classifier: &str) -> Self {
        Self {
            classifier: Some(classifier.to_owned()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_owned(),
            ..self.clone()
        }
    }

    /// Path inside a maven repository.
    #[must_use]
    pub fn path(&self) -> String {
        let Coordinate {
            group,
            artifact,
            version,
            classifier,
            extension,
        } = self;
        let group = group.replace('.', "/");
        match classifier {
            Some(classifier) => {
                format!("{group}/{artifact}/{version}/{artifact}-{version}-{classifier}.{extension}")
            }
            None => format!("{group}/{artifact}/{version}/{artifact}-{version}.{extension}"),
        }
    }
}

impl FromStr for Coordinate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, extension) = match s.split_once('@') {
            Some((rest, ext)) => (rest, ext.to_owned()),
            None => (s, "jar".to_owned()),
        };
        let parts: Vec<&str> = rest.split(':').collect();
        let (group, artifact, version, classifier) = match parts.as_slice() {
            [g, a, v] => (g, a, v, None),
            [g, a, v, c] => (g, a, v, Some((*c).to_owned())),
            _ => return Err(format!("invalid library coordinate: {s}")),
        };
        if group.is_empty() || artifact.is_empty() || version.is_empty() {
            return Err(format!("invalid library coordinate: {s}"));
        }
        Ok(Self {
            group: (*group).to_owned(),
            artifact: (*artifact).to_owned(),
            version: (*version).to_owned(),
            classifier,
            extension,
        })
    }
}

impl TryFrom<String> for Coordinate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coordinate> for String {
    fn from(value: Coordinate) -> Self {
        value.to_string()
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arch, Os};

    #[test]
    fn coordinate_paths() {
        let c: Coordinate = "org.lwjgl:lwjgl:3.3.1".parse().unwrap();
        assert_eq!(c.path(), "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar");
        let c: Coordinate = "org.lwjgl:lwjgl:3.3.1:natives-linux".parse().unwrap();
        assert_eq!(
            c.path(),
            "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar"
        );
        let c: Coordinate = "de.oceanlabs.mcp:mcp_config:1.20.1@zip".parse().unwrap();
        assert_eq!(
            c.path(),
            "de/oceanlabs/mcp/mcp_config/1.20.1/mcp_config-1.20.1.zip"
        );
        assert_eq!(c.to_string(), "de.oceanlabs.mcp:mcp_config:1.20.1@zip");
        assert!("just-a-name".parse::<Coordinate>().is_err());
    }

    #[test]
    fn legacy_natives_with_arch() {
        let json: LibraryJson = serde_json::from_str(
            r#"{
                "name": "tv.twitch:twitch-platform:5.16",
                "natives": {"windows": "natives-windows-${arch}", "osx": "natives-osx"},
                "downloads": {"classifiers": {
                    "natives-windows-64": {"path": "tv/twitch/twitch-platform/5.16/twitch-platform-5.16-natives-windows-64.jar",
                        "url": "https://libraries.minecraft.net/tv/twitch/twitch-platform/5.16/twitch-platform-5.16-natives-windows-64.jar",
                        "sha1": "abc", "size": 10}
                }}
            }"#,
        )
        .unwrap();
        let lib = LibraryRef::from_json(&json, "https://libraries.minecraft.net/").unwrap();
        assert_eq!(lib.main, MainJar::Absent);
        assert!(lib.main_artifact().is_none());

        let win64 = Platform::new(Os::Windows, Arch::X86_64);
        let native = lib.native_artifact(win64).unwrap();
        assert_eq!(native.size, 10);
        assert!(native.path.ends_with("natives-windows-64.jar"));

        let linux = Platform::new(Os::Linux, Arch::X86_64);
        assert!(lib.native_artifact(linux).is_none());
    }

    #[test]
    fn derived_main_and_native() {
        let json: LibraryJson = serde_json::from_str(
            r#"{"name": "net.fabricmc:sponge-mixin:0.12.5", "url": "https://maven.fabricmc.net"}"#,
        )
        .unwrap();
        let lib = LibraryRef::from_json(&json, "https://libraries.minecraft.net/").unwrap();
        let main = lib.main_artifact().unwrap();
        assert_eq!(
            main.url,
            "https://maven.fabricmc.net/net/fabricmc/sponge-mixin/0.12.5/sponge-mixin-0.12.5.jar"
        );

        let mut lib = LibraryRef::maven(
            "org.lwjgl:lwjgl:3.3.3".parse().unwrap(),
            "https://repo1.maven.org/maven2/",
        );
        lib.natives
            .insert("linux".to_owned(), "natives-linux-arm64".to_owned());
        let native = lib
            .native_artifact(Platform::new(Os::Linux, Arch::Aarch64))
            .unwrap();
        assert_eq!(
            native.url,
            "https://repo1.maven.org/maven2/org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-linux-arm64.jar"
        );
    }

    #[test]
    fn descriptor_roundtrips_through_cache_format() {
        let json: LibraryJson = serde_json::from_str(
            r#"{"name": "com.mojang:brigadier:1.1.8", "downloads": {"artifact": {
                "path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                "url": "https://libraries.minecraft.net/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                "sha1": "5244ce82c3337bba4a196a3ce858bfaecc74404a", "size": 77392}}}"#,
        )
        .unwrap();
        let lib = LibraryRef::from_json(&json, "").unwrap();
        let text = serde_json::to_string(&lib).unwrap();
        let back: LibraryRef = serde_json::from_str(&text).unwrap();
        assert_eq!(back, lib);
        assert_eq!(back.coordinate.to_string(), "com.mojang:brigadier:1.1.8");
    }
}
