//! Platform compatibility overrides.
//!
//! Upstream version JSONs don't ship natives for every platform
//! (no ARM Linux at all, no Apple Silicon before LWJGL 3.3).
//! An override pins every member of a library family to a
//! version that does have them, on the listed platforms only.
//!
//! Replacement is all-or-nothing per family: every matching main jar
//! is swapped for the pinned version (with the platform's native
//! classifier attached) and every natives-only entry is dropped,
//! so old and new versions never end up mixed on the classpath.

use std::collections::BTreeMap;

use kiln_core::{
    err, file_utils,
    json::{LibraryRef, VersionDescriptor},
    pt, rules, JsonFileError, LauncherDirs, Platform,
};
use serde::{Deserialize, Serialize};

const BUILTIN: &str = include_str!("compat_overrides.json");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompatOverride {
    /// `os-arch` keys, like `linux-aarch64`.
    pub platforms: Vec<String>,
    /// Maven group of the family, matched exactly.
    pub group: String,
    /// Only replace versions starting with one of these.
    /// Empty matches every version.
    #[serde(default)]
    pub version_prefixes: Vec<String>,
    pub pinned_version: String,
    pub repository: String,
    pub natives_classifier: String,
}

impl CompatOverride {
    fn matches(&self, library: &LibraryRef) -> bool {
        library.coordinate.group == self.group
            && (self.version_prefixes.is_empty()
                || self
                    .version_prefixes
                    .iter()
                    .any(|prefix| library.coordinate.version.starts_with(prefix)))
    }

    fn replacement(&self, library: &LibraryRef, platform: Platform) -> LibraryRef {
        let mut coordinate = library.coordinate.with_version(&self.pinned_version);
        coordinate.classifier = None;

        let mut replacement = LibraryRef::maven(coordinate, &self.repository);
        replacement.natives = BTreeMap::from([(
            platform.os.name().to_owned(),
            self.natives_classifier.clone(),
        )]);
        replacement.rules.clone_from(&library.rules);
        replacement.extract_exclude.clone_from(&library.extract_exclude);
        replacement
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatOverrides {
    pub overrides: Vec<CompatOverride>,
}

impl CompatOverrides {
    /// The table shipped with the launcher.
    #[must_use]
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN).unwrap_or_else(|error| {
            err!("Built-in compatibility overrides are invalid: {error}");
            Self::default()
        })
    }

    /// `<launcher dir>/compat_overrides.json` if present,
    /// otherwise the built-in table.
    ///
    /// # Errors
    /// If the file exists but can't be read or parsed.
    pub async fn load(dirs: &LauncherDirs) -> Result<Self, JsonFileError> {
        let path = dirs.compat_overrides_file();
        if path.is_file() {
            pt!("Using compatibility overrides from {path:?}");
            file_utils::read_json_file(&path).await
        } else {
            Ok(Self::builtin())
        }
    }

    /// Applies every override targeting `platform`.
    /// Returns the number of libraries that were replaced or dropped.
    pub fn apply(&self, descriptor: &mut VersionDescriptor, platform: Platform) -> usize {
        let key = platform.to_string();
        let mut changed = 0;

        for rule in self.overrides.iter().filter(|o| o.platforms.contains(&key)) {
            let mut replaced_families = Vec::new();
            let mut libraries = Vec::with_capacity(descriptor.libraries.len());

            for library in std::mem::take(&mut descriptor.libraries) {
                if !rule.matches(&library) {
                    libraries.push(library);
                    continue;
                }
                changed += 1;
                // Members gated off this platform never stand in for the family.
                if !rules::applies(&library.rules, platform)
                    || library.main_artifact().is_none()
                    || library.is_natives_jar()
                {
                    continue;
                }
                let family = library.coordinate.family();
                if replaced_families.contains(&family) {
                    continue;
                }
                libraries.push(rule.replacement(&library, platform));
                replaced_families.push(family);
            }

            if !replaced_families.is_empty() {
                pt!(
                    "Pinned {} {} libraries to {} for {key}",
                    replaced_families.len(),
                    rule.group,
                    rule.pinned_version
                );
            }
            descriptor.libraries = libraries;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use kiln_core::{
        json::{version::LibraryJson, VersionDescriptor},
        rules::Rule,
        Arch, Os,
    };

    use super::*;
    use crate::resolve::normalize::tests::descriptor_with;

    fn lib(json: &str) -> LibraryRef {
        let json: LibraryJson = serde_json::from_str(json).unwrap();
        LibraryRef::from_json(&json, "https://libraries.minecraft.net/").unwrap()
    }

    /// The LWJGL entries of a 1.20.1 version JSON, shortened.
    fn lwjgl_descriptor() -> VersionDescriptor {
        descriptor_with(vec![
            lib(r#"{"name": "com.mojang:brigadier:1.1.8"}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl:3.3.1", "downloads": {"artifact": {
                "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar",
                "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar", "size": 1}}}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl:3.3.1:natives-linux", "rules": [{"action": "allow", "os": {"name": "linux"}}],
                "downloads": {"artifact": {
                "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
                "url": "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar", "size": 1}}}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl-glfw:3.3.1"}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl-glfw:3.3.1:natives-linux", "rules": [{"action": "allow", "os": {"name": "linux"}}]}"#),
        ])
    }

    #[test]
    fn builtin_table_parses() {
        let table = CompatOverrides::builtin();
        assert_eq!(table.overrides.len(), 3);
        assert!(table
            .overrides
            .iter()
            .all(|o| o.pinned_version == "3.3.3"));
    }

    #[test]
    fn arm_linux_replaces_whole_family() {
        let mut descriptor = lwjgl_descriptor();
        let platform = Platform::new(Os::Linux, Arch::Aarch64);
        let changed = CompatOverrides::builtin().apply(&mut descriptor, platform);
        assert_eq!(changed, 4);

        let names: Vec<String> = descriptor
            .libraries
            .iter()
            .map(|l| l.coordinate.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "com.mojang:brigadier:1.1.8",
                "org.lwjgl:lwjgl:3.3.3",
                "org.lwjgl:lwjgl-glfw:3.3.3"
            ]
        );

        let native = descriptor.libraries[1].native_artifact(platform).unwrap();
        assert_eq!(
            native.url,
            "https://repo1.maven.org/maven2/org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-linux-arm64.jar"
        );
    }

    #[test]
    fn other_platforms_are_untouched() {
        let original = lwjgl_descriptor();
        for platform in [
            Platform::new(Os::Linux, Arch::X86_64),
            Platform::new(Os::Windows, Arch::X86_64),
            // 3.3.1 already has Apple Silicon natives
            Platform::new(Os::Osx, Arch::Aarch64),
        ] {
            let mut descriptor = original.clone();
            assert_eq!(CompatOverrides::builtin().apply(&mut descriptor, platform), 0);
            assert_eq!(descriptor, original);
        }
    }

    #[test]
    fn version_prefix_gates_replacement() {
        let mut descriptor = descriptor_with(vec![
            lib(r#"{"name": "org.lwjgl:lwjgl:3.2.2"}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl-openal:3.2.2", "natives": {"osx": "natives-macos"}}"#),
        ]);
        let mac = Platform::new(Os::Osx, Arch::Aarch64);
        assert_eq!(CompatOverrides::builtin().apply(&mut descriptor, mac), 2);
        assert!(descriptor
            .libraries
            .iter()
            .all(|l| l.coordinate.version == "3.3.3"));
        assert_eq!(
            descriptor.libraries[1].native_classifier(mac).as_deref(),
            Some("natives-macos-arm64")
        );
    }

    #[test]
    fn mac_family_uses_the_entry_meant_for_mac() {
        // 1.14 - 1.18 ship one LWJGL for everything but macOS, and an older one for macOS.
        let mut descriptor = descriptor_with(vec![
            lib(r#"{"name": "org.lwjgl:lwjgl:3.2.2", "rules": [
                {"action": "allow"}, {"action": "disallow", "os": {"name": "osx"}}]}"#),
            lib(r#"{"name": "org.lwjgl:lwjgl:3.2.1", "rules": [
                {"action": "allow", "os": {"name": "osx"}}]}"#),
        ]);
        let mac = Platform::new(Os::Osx, Arch::Aarch64);
        assert_eq!(CompatOverrides::builtin().apply(&mut descriptor, mac), 2);

        let applicable: Vec<String> = descriptor
            .libraries
            .iter()
            .filter(|l| rules::applies(&l.rules, mac))
            .map(|l| l.coordinate.to_string())
            .collect();
        assert_eq!(applicable, ["org.lwjgl:lwjgl:3.3.3"]);
        assert_eq!(descriptor.libraries.len(), 1);
    }

    #[test]
    fn replacement_keeps_rules() {
        let mut original = lib(r#"{"name": "org.lwjgl:lwjgl:3.3.1"}"#);
        original.rules = vec![Rule::allow().on_os("linux")];
        let mut descriptor = descriptor_with(vec![original]);
        CompatOverrides::builtin().apply(&mut descriptor, Platform::new(Os::Linux, Arch::Arm));
        assert_eq!(descriptor.libraries[0].rules.len(), 1);
        assert_eq!(
            descriptor.libraries[0]
                .native_classifier(Platform::new(Os::Linux, Arch::Arm))
                .as_deref(),
            Some("natives-linux-arm32")
        );
    }

    #[tokio::test]
    async fn file_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = LauncherDirs::new(dir.path());
        assert_eq!(
            CompatOverrides::load(&dirs).await.unwrap(),
            CompatOverrides::builtin()
        );
        std::fs::write(dirs.compat_overrides_file(), r#"{"overrides": []}"#).unwrap();
        assert!(CompatOverrides::load(&dirs).await.unwrap().overrides.is_empty());
    }
}
