use std::{collections::BTreeSet, path::PathBuf};

use kiln_core::{
    download::DownloadTask,
    json::{descriptor::RemoteFile, AssetIndex, VersionDescriptor},
    rules, LauncherDirs, Platform,
};
use serde::Serialize;

/// A native-classifier jar to unpack before launching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeJar {
    pub path: PathBuf,
    /// Entry prefixes to leave out (usually `META-INF/`).
    pub exclude: Vec<String>,
}

/// Everything needed on disk for one descriptor on one platform,
/// except the asset objects (those need the downloaded index,
/// see [`plan_assets`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadPlan {
    pub client: DownloadTask,
    pub logging: Option<DownloadTask>,
    pub asset_index: DownloadTask,
    /// Main jars and native jars, one task per target path.
    pub libraries: Vec<DownloadTask>,
    pub natives: Vec<NativeJar>,
    /// Library jars in descriptor order, then the client jar.
    pub classpath: Vec<PathBuf>,
}

impl DownloadPlan {
    /// Client jar, logging config and asset index.
    #[must_use]
    pub fn client_tasks(&self) -> Vec<DownloadTask> {
        let mut tasks = vec![self.client.clone()];
        tasks.extend(self.logging.clone());
        tasks.push(self.asset_index.clone());
        tasks
    }
}

fn task(path: PathBuf, file: &RemoteFile, label: String) -> DownloadTask {
    DownloadTask::new(path, &file.url, label)
        .with_size(file.size)
        .with_sha1(file.sha1.clone())
}

/// Where the client jar of `game_version` lives.
#[must_use]
pub fn client_jar_path(dirs: &LauncherDirs, game_version: &str) -> PathBuf {
    dirs.version_dir(game_version)
        .join(format!("{game_version}.jar"))
}

/// Builds the download plan of `descriptor` for `platform`.
///
/// Libraries whose rules don't apply are left out entirely,
/// including their natives. The same inputs always give the same plan.
#[must_use]
pub fn plan(descriptor: &VersionDescriptor, platform: Platform, dirs: &LauncherDirs) -> DownloadPlan {
    let libraries_dir = dirs.libraries();
    let mut seen_paths = BTreeSet::new();
    let mut libraries = Vec::new();
    let mut natives = Vec::new();
    let mut classpath = Vec::new();

    for library in &descriptor.libraries {
        if !rules::applies(&library.rules, platform) {
            continue;
        }
        let name = library.coordinate.to_string();

        if let Some(artifact) = library.main_artifact() {
            let path = libraries_dir.join(&artifact.path);
            if seen_paths.insert(path.clone()) {
                libraries.push(
                    DownloadTask::new(&path, &artifact.url, &name)
                        .with_size(artifact.size)
                        .with_sha1(artifact.sha1.clone()),
                );
                classpath.push(path.clone());
            }
            if library.is_natives_jar() {
                natives.push(NativeJar {
                    path,
                    exclude: library.extract_exclude.clone(),
                });
            }
        }

        if let Some(artifact) = library.native_artifact(platform) {
            let path = libraries_dir.join(&artifact.path);
            if seen_paths.insert(path.clone()) {
                libraries.push(
                    DownloadTask::new(&path, &artifact.url, format!("{name} (natives)"))
                        .with_size(artifact.size)
                        .with_sha1(artifact.sha1.clone()),
                );
            }
            natives.push(NativeJar {
                path,
                exclude: library.extract_exclude.clone(),
            });
        }
    }

    let client_path = client_jar_path(dirs, &descriptor.game_version);
    classpath.push(client_path.clone());

    DownloadPlan {
        client: task(
            client_path,
            &descriptor.client,
            format!("{}.jar", descriptor.game_version),
        ),
        logging: descriptor.logging.as_ref().map(|logging| {
            task(
                dirs.log_configs().join(&logging.id),
                &logging.file,
                logging.id.clone(),
            )
        }),
        asset_index: task(
            dirs.asset_indexes()
                .join(format!("{}.json", descriptor.asset_index.id)),
            &descriptor.asset_index.file,
            format!("asset index {}", descriptor.asset_index.id),
        ),
        libraries,
        natives,
        classpath,
    }
}

/// One task per distinct object of `index`, fetched from
/// `<resources_base>/<hh>/<hash>`.
#[must_use]
pub fn plan_assets(index: &AssetIndex, dirs: &LauncherDirs, resources_base: &str) -> Vec<DownloadTask> {
    let objects_dir = dirs.asset_objects();
    let base = resources_base.trim_end_matches('/');
    let mut seen = BTreeSet::new();

    index
        .objects
        .iter()
        .filter(|(_, object)| seen.insert(object.hash.clone()))
        .map(|(name, object)| {
            let relative = object.object_path();
            DownloadTask::new(
                objects_dir.join(&relative),
                format!("{base}/{relative}"),
                name,
            )
            .with_size(object.size)
            .with_sha1(Some(object.hash.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use kiln_core::{
        json::{AssetObject, LibraryRef, VersionJson},
        Arch, Os,
    };

    use super::*;
    use crate::resolve::normalize::{self, tests::vanilla_json};

    const LINUX: Platform = Platform::new(Os::Linux, Arch::X86_64);
    const REPO: &str = "https://libraries.minecraft.net/";

    fn descriptor() -> VersionDescriptor {
        let mut json = vanilla_json("1.20.1", "http://x");
        let libraries = json["libraries"].as_array_mut().unwrap();
        libraries.push(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.1",
            "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar",
                "url": "http://x/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar", "size": 10}}
        }));
        libraries.push(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.1:natives-linux",
            "rules": [{"action": "allow", "os": {"name": "linux"}}],
            "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
                "url": "http://x/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar", "size": 10}}
        }));
        libraries.push(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.1:natives-windows",
            "rules": [{"action": "allow", "os": {"name": "windows"}}],
            "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar",
                "url": "http://x/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar", "size": 10}}
        }));
        libraries.push(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "natives": {"linux": "natives-linux", "windows": "natives-windows-${arch}"},
            "extract": {"exclude": ["META-INF/"]}
        }));
        let json: VersionJson = serde_json::from_value(json).unwrap();
        normalize::vanilla(&json, REPO).unwrap()
    }

    fn names(tasks: &[DownloadTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.label.as_str()).collect()
    }

    #[test]
    fn linux_plan() {
        let dirs = LauncherDirs::new("/kiln");
        let plan = plan(&descriptor(), LINUX, &dirs);

        assert_eq!(
            names(&plan.libraries),
            [
                "com.mojang:brigadier:1.1.8",
                "org.lwjgl:lwjgl:3.3.1",
                "org.lwjgl:lwjgl:3.3.1:natives-linux",
                "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
                "org.lwjgl.lwjgl:lwjgl-platform:2.9.4 (natives)",
            ]
        );
        assert_eq!(plan.natives.len(), 2);
        assert_eq!(plan.natives[1].exclude, ["META-INF/"]);
        assert_eq!(
            plan.natives[1].path,
            Path::new("/kiln/libraries/org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar")
        );

        assert_eq!(
            plan.classpath.last().unwrap(),
            Path::new("/kiln/versions/1.20.1/1.20.1.jar")
        );
        assert_eq!(plan.classpath.len(), 5);
        assert_eq!(
            plan.asset_index.path,
            Path::new("/kiln/assets/indexes/5.json")
        );
        assert_eq!(
            plan.logging.as_ref().unwrap().path,
            Path::new("/kiln/assets/log_configs/client-1.12.xml")
        );
        assert_eq!(plan.client_tasks().len(), 3);
    }

    #[test]
    fn arch_token_in_classifier() {
        let dirs = LauncherDirs::new("/kiln");
        let plan = plan(
            &descriptor(),
            Platform::new(Os::Windows, Arch::X86_64),
            &dirs,
        );
        assert!(names(&plan.libraries).contains(&"org.lwjgl:lwjgl:3.3.1:natives-windows"));
        assert!(plan.natives.iter().any(|n| n
            .path
            .ends_with("lwjgl-platform-2.9.4-natives-windows-64.jar")));
    }

    #[test]
    fn plan_is_deterministic() {
        let dirs = LauncherDirs::new("/kiln");
        let descriptor = descriptor();
        let first = serde_json::to_vec(&plan(&descriptor, LINUX, &dirs)).unwrap();
        let second = serde_json::to_vec(&plan(&descriptor, LINUX, &dirs)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_libraries_download_once() {
        let dirs = LauncherDirs::new("/kiln");
        let mut descriptor = descriptor();
        let loader_copy: LibraryRef = descriptor.libraries[0].clone();
        descriptor.libraries.insert(0, loader_copy);

        let plan = plan(&descriptor, LINUX, &dirs);
        assert_eq!(
            plan.libraries
                .iter()
                .filter(|t| t.label == "com.mojang:brigadier:1.1.8")
                .count(),
            1
        );
    }

    #[test]
    fn assets_are_sharded_and_deduplicated() {
        let dirs = LauncherDirs::new("/kiln");
        let hash = "bdf48ef6b5d0d23bbb02e17d04865216179f510a".to_owned();
        let mut index = AssetIndex::default();
        for name in ["a.ogg", "b.ogg"] {
            index.objects.insert(
                name.to_owned(),
                AssetObject {
                    hash: hash.clone(),
                    size: 3,
                },
            );
        }

        let tasks = plan_assets(&index, &dirs, "https://resources.example/");
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].url,
            format!("https://resources.example/bd/{hash}")
        );
        assert_eq!(
            tasks[0].path,
            Path::new("/kiln/assets/objects/bd").join(&hash)
        );
        assert_eq!(tasks[0].sha1.as_deref(), Some(hash.as_str()));
    }
}
