use kiln_core::json::{
    descriptor::RemoteFile, ArgumentTemplate, AssetIndexRef, LibraryRef, LoggingRef,
    VersionDescriptor, VersionJson,
};

use super::ResolveError;

/// JVM arguments for versions that predate `arguments.jvm`.
fn default_jvm_arguments() -> Vec<ArgumentTemplate> {
    ["-Djava.library.path=${natives_directory}", "-cp", "${classpath}"]
        .into_iter()
        .map(ArgumentTemplate::literal)
        .collect()
}

fn libraries(
    json: &VersionJson,
    default_repository: &str,
) -> Result<Vec<LibraryRef>, ResolveError> {
    json.libraries
        .iter()
        .map(|library| {
            LibraryRef::from_json(library, default_repository).map_err(|reason| {
                ResolveError::InvalidVersionJson {
                    id: json.id.clone(),
                    reason,
                }
            })
        })
        .collect()
}

/// Turns a vanilla version JSON into a descriptor.
///
/// Old versions only have a `minecraftArguments` line;
/// it becomes literal game templates, and the JVM side gets
/// the classic natives path + classpath arguments.
pub(crate) fn vanilla(
    json: &VersionJson,
    default_repository: &str,
) -> Result<VersionDescriptor, ResolveError> {
    let invalid = |reason: &str| ResolveError::InvalidVersionJson {
        id: json.id.clone(),
        reason: reason.to_owned(),
    };

    let main_class = json
        .mainClass
        .clone()
        .filter(|class| !class.is_empty())
        .ok_or_else(|| invalid("missing mainClass"))?;
    let asset_index = json
        .assetIndex
        .as_ref()
        .ok_or_else(|| invalid("missing assetIndex"))?;
    let client = json
        .downloads
        .as_ref()
        .map(|downloads| &downloads.client)
        .ok_or_else(|| invalid("missing downloads.client"))?;

    let (jvm_arguments, game_arguments) = match (&json.arguments, &json.minecraftArguments) {
        (Some(arguments), _) => {
            let jvm = if arguments.jvm.is_empty() {
                default_jvm_arguments()
            } else {
                arguments.jvm.clone()
            };
            (jvm, arguments.game.clone())
        }
        (None, Some(line)) => (
            default_jvm_arguments(),
            ArgumentTemplate::from_legacy_line(line),
        ),
        (None, None) => return Err(invalid("no arguments or minecraftArguments")),
    };

    let logging = json
        .logging
        .as_ref()
        .and_then(|logging| logging.client.as_ref())
        .map(|client| LoggingRef {
            argument: client.argument.clone(),
            id: client.file.id.clone(),
            file: RemoteFile {
                url: client.file.url.clone(),
                sha1: client.file.sha1.clone(),
                size: client.file.size,
            },
        });

    Ok(VersionDescriptor {
        id: json.id.clone(),
        game_version: json.id.clone(),
        kind: json.kind.clone().unwrap_or_else(|| "release".to_owned()),
        main_class,
        libraries: libraries(json, default_repository)?,
        asset_index: AssetIndexRef {
            id: asset_index.id.clone(),
            file: RemoteFile {
                url: asset_index.url.clone(),
                sha1: asset_index.sha1.clone(),
                size: asset_index.size,
            },
        },
        client: RemoteFile {
            url: client.url.clone(),
            sha1: client.sha1.clone(),
            size: client.size,
        },
        jvm_arguments,
        game_arguments,
        java_version: json.javaVersion.as_ref().map(|java| java.majorVersion),
        logging,
    })
}

/// Layers a loader profile over a vanilla descriptor.
///
/// - the loader's main class wins
/// - the loader's libraries go first, duplicates included
///   (loaders shadow vanilla jars by classpath position)
/// - argument templates are appended after vanilla's, except that
///   a legacy `minecraftArguments` line replaces vanilla's game arguments
///   since it's always a complete line
pub(crate) fn merge(
    mut descriptor: VersionDescriptor,
    profile: &VersionJson,
    id: &str,
    default_repository: &str,
) -> Result<VersionDescriptor, ResolveError> {
    let main_class = profile
        .mainClass
        .clone()
        .filter(|class| !class.is_empty())
        .ok_or_else(|| ResolveError::InvalidVersionJson {
            id: profile.id.clone(),
            reason: "loader profile has no mainClass".to_owned(),
        })?;

    let mut merged = libraries(profile, default_repository)?;
    merged.append(&mut descriptor.libraries);

    if let Some(arguments) = &profile.arguments {
        descriptor.jvm_arguments.extend(arguments.jvm.iter().cloned());
        descriptor
            .game_arguments
            .extend(arguments.game.iter().cloned());
    } else if let Some(line) = &profile.minecraftArguments {
        descriptor.game_arguments = ArgumentTemplate::from_legacy_line(line);
    }

    if let Some(java) = &profile.javaVersion {
        descriptor.java_version = Some(java.majorVersion);
    }

    descriptor.id = id.to_owned();
    descriptor.main_class = main_class;
    descriptor.libraries = merged;
    Ok(descriptor)
}

#[cfg(test)]
pub(crate) mod tests {
    use kiln_core::json::MainJar;
    use serde_json::json;

    use super::*;

    const REPO: &str = "https://libraries.minecraft.net/";

    /// A minimal descriptor holding just `libraries`.
    pub(crate) fn descriptor_with(libraries: Vec<LibraryRef>) -> VersionDescriptor {
        VersionDescriptor {
            id: "1.20.1".to_owned(),
            game_version: "1.20.1".to_owned(),
            kind: "release".to_owned(),
            main_class: "net.minecraft.client.main.Main".to_owned(),
            libraries,
            asset_index: AssetIndexRef {
                id: "5".to_owned(),
                file: RemoteFile {
                    url: "https://example.invalid/5.json".to_owned(),
                    sha1: None,
                    size: 0,
                },
            },
            client: RemoteFile {
                url: "https://example.invalid/client.jar".to_owned(),
                sha1: None,
                size: 0,
            },
            jvm_arguments: default_jvm_arguments(),
            game_arguments: Vec::new(),
            java_version: Some(17),
            logging: None,
        }
    }

    pub(crate) fn vanilla_json(id: &str, base: &str) -> serde_json::Value {
        json!({
            "id": id,
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "5", "sha1": null, "size": 0, "totalSize": 0, "url": format!("{base}/indexes/5.json")},
            "downloads": {"client": {"sha1": null, "size": 0, "url": format!("{base}/client.jar")}},
            "javaVersion": {"component": "java-runtime-gamma", "majorVersion": 17},
            "libraries": [
                {"name": "com.mojang:brigadier:1.1.8", "downloads": {"artifact": {
                    "path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                    "url": format!("{base}/libraries/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar"),
                    "size": 0}}}
            ],
            "arguments": {
                "game": ["--username", "${auth_player_name}", "--version", "${version_name}"],
                "jvm": [
                    {"rules": [{"action": "allow", "os": {"name": "osx"}}], "value": ["-XstartOnFirstThread"]},
                    "-Djava.library.path=${natives_directory}", "-cp", "${classpath}"
                ]
            },
            "logging": {"client": {
                "argument": "-Dlog4j.configurationFile=${path}",
                "file": {"id": "client-1.12.xml", "sha1": null, "size": 0, "url": format!("{base}/client-1.12.xml")},
                "type": "log4j2-xml"
            }}
        })
    }

    fn parse(value: serde_json::Value) -> VersionJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn modern_vanilla() {
        let descriptor = vanilla(&parse(vanilla_json("1.20.1", "http://x")), REPO).unwrap();
        assert_eq!(descriptor.main_class, "net.minecraft.client.main.Main");
        assert_eq!(descriptor.java_version, Some(17));
        assert_eq!(descriptor.jvm_arguments.len(), 4);
        assert_eq!(descriptor.game_arguments.len(), 4);
        assert_eq!(descriptor.logging.unwrap().id, "client-1.12.xml");
        assert!(matches!(descriptor.libraries[0].main, MainJar::Explicit(_)));
    }

    #[test]
    fn legacy_arguments_get_default_jvm_args() {
        let mut json = vanilla_json("1.7.10", "http://x");
        json["arguments"] = serde_json::Value::Null;
        json["minecraftArguments"] =
            json!("--username ${auth_player_name} --session ${auth_session}");
        let descriptor = vanilla(&parse(json), REPO).unwrap();

        assert_eq!(descriptor.game_arguments.len(), 4);
        assert_eq!(descriptor.jvm_arguments, default_jvm_arguments());
    }

    #[test]
    fn missing_main_class_is_rejected() {
        let mut json = vanilla_json("1.20.1", "http://x");
        json["mainClass"] = serde_json::Value::Null;
        let err = vanilla(&parse(json), REPO).unwrap_err();
        assert!(err.to_string().contains("1.20.1"), "{err}");
    }

    #[test]
    fn loader_libraries_come_first() {
        let base = vanilla(&parse(vanilla_json("1.20.1", "http://x")), REPO).unwrap();
        let profile = parse(json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "]},
            "libraries": [
                {"name": "net.fabricmc:fabric-loader:0.15.0", "url": "https://maven.fabricmc.net/"},
                // a loader shadowing a vanilla jar keeps both entries
                {"name": "com.mojang:brigadier:1.1.8", "url": "https://maven.fabricmc.net/"}
            ]
        }));

        let merged = merge(base, &profile, "1.20.1-fabric-0.15.0", REPO).unwrap();
        let names: Vec<String> = merged
            .libraries
            .iter()
            .map(|l| l.coordinate.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "net.fabricmc:fabric-loader:0.15.0",
                "com.mojang:brigadier:1.1.8",
                "com.mojang:brigadier:1.1.8"
            ]
        );
        assert_eq!(
            merged.main_class,
            "net.fabricmc.loader.impl.launch.knot.KnotClient"
        );
        assert_eq!(merged.id, "1.20.1-fabric-0.15.0");
        assert_eq!(merged.game_version, "1.20.1");
        assert_eq!(
            merged.jvm_arguments.last(),
            Some(&ArgumentTemplate::literal(
                "-DFabricMcEmu= net.minecraft.client.main.Main "
            ))
        );
    }

    #[test]
    fn legacy_loader_line_replaces_game_arguments() {
        let mut json = vanilla_json("1.7.10", "http://x");
        json["arguments"] = serde_json::Value::Null;
        json["minecraftArguments"] = json!("--username ${auth_player_name}");
        let base = vanilla(&parse(json), REPO).unwrap();

        let profile = parse(json!({
            "id": "1.7.10-Forge10.13.4.1614-1.7.10",
            "mainClass": "net.minecraft.launchwrapper.Launch",
            "minecraftArguments": "--username ${auth_player_name} --tweakClass cpw.mods.fml.common.launcher.FMLTweaker",
            "libraries": [{"name": "net.minecraftforge:forge:1.7.10-10.13.4.1614-1.7.10", "downloads": {"artifact": {
                "path": "net/minecraftforge/forge/1.7.10-10.13.4.1614-1.7.10/forge-1.7.10-10.13.4.1614-1.7.10.jar",
                "url": ""}}}]
        }));
        let merged = merge(base, &profile, "1.7.10-forge-10.13.4.1614", REPO).unwrap();
        assert_eq!(
            merged.game_arguments,
            ArgumentTemplate::from_legacy_line(
                "--username ${auth_player_name} --tweakClass cpw.mods.fml.common.launcher.FMLTweaker"
            )
        );
        // generated by the installer, nothing to download
        assert_eq!(merged.libraries[0].main_artifact().unwrap().url, "");
    }
}
