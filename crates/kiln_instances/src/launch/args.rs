use std::{collections::HashMap, path::Path};

use kiln_core::{
    json::{ArgumentTemplate, VersionDescriptor},
    Platform, CLASSPATH_SEPARATOR, LAUNCHER_NAME, LAUNCHER_VERSION_NAME,
};

/// Flags that must never reach the game, along with their values.
/// Matched by prefix, so `--quickPlay` covers every quick play variant.
const UNWANTED_FLAGS: &[&str] = &["--demo", "--quickPlay"];

/// Values for `${token}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct TokenValues(HashMap<&'static str, String>);

impl TokenValues {
    pub fn set(&mut self, token: &'static str, value: impl Into<String>) -> &mut Self {
        self.0.insert(token, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    /// Replaces every known `${token}` in `input`.
    /// Unknown tokens are left as they are.
    #[must_use]
    pub fn substitute(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let token = &after[..end];
            match self.get(token) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 2 + end + 1]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Everything the token table is built from.
pub struct TokenSource<'a> {
    pub descriptor: &'a VersionDescriptor,
    pub username: &'a str,
    pub uuid: &'a str,
    pub access_token: &'a str,
    pub user_type: &'a str,
    pub game_dir: &'a Path,
    pub assets_dir: &'a Path,
    /// `assets/virtual/<index id>`, used by old versions.
    pub virtual_assets_dir: &'a Path,
    pub libraries_dir: &'a Path,
    pub natives_dir: &'a Path,
    pub classpath: &'a [std::path::PathBuf],
    pub window_width: u32,
    pub window_height: u32,
}

impl TokenValues {
    #[must_use]
    pub fn build(src: &TokenSource<'_>) -> Self {
        let path = |p: &Path| p.to_string_lossy().into_owned();
        let classpath = src
            .classpath
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join(&CLASSPATH_SEPARATOR.to_string());

        let mut values = Self::default();
        values
            .set("auth_player_name", src.username)
            .set("version_name", &src.descriptor.id)
            .set("version_type", &src.descriptor.kind)
            .set("game_directory", path(src.game_dir))
            .set("assets_root", path(src.assets_dir))
            .set("game_assets", path(src.virtual_assets_dir))
            .set("assets_index_name", &src.descriptor.asset_index.id)
            .set("auth_uuid", src.uuid)
            .set("uuid", src.uuid)
            .set("auth_access_token", src.access_token)
            .set("auth_session", src.access_token)
            .set("accessToken", src.access_token)
            .set("user_type", src.user_type)
            .set("user_properties", "{}")
            .set("auth_xuid", "0")
            .set("clientid", "0")
            .set("classpath", classpath)
            .set("classpath_separator", CLASSPATH_SEPARATOR.to_string())
            .set("natives_directory", path(src.natives_dir))
            .set("library_directory", path(src.libraries_dir))
            .set("launcher_name", LAUNCHER_NAME)
            .set("launcher_version", LAUNCHER_VERSION_NAME)
            .set("resolution_width", src.window_width.to_string())
            .set("resolution_height", src.window_height.to_string());
        values
    }
}

/// Drops entries whose rules exclude `platform`, then substitutes tokens.
#[must_use]
pub fn render(templates: &[ArgumentTemplate], platform: Platform, values: &TokenValues) -> Vec<String> {
    templates
        .iter()
        .flat_map(|template| template.tokens(platform))
        .map(|token| values.substitute(token))
        .collect()
}

/// Removes [`UNWANTED_FLAGS`] together with the value tokens
/// following them (everything up to the next `-` flag).
#[must_use]
pub fn strip_unwanted(args: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut skipping = false;
    for arg in args {
        if arg.starts_with('-') {
            skipping = UNWANTED_FLAGS.iter().any(|flag| arg.starts_with(flag));
            if skipping {
                continue;
            }
        } else if skipping {
            continue;
        }
        out.push(arg);
    }
    out
}

/// Replaces the value after `flag` (and any token equal to `secret`)
/// with `[REDACTED]`, for logging.
#[must_use]
pub fn censor(args: &[String], flags: &[&str], secrets: &[&str]) -> Vec<String> {
    let mut out = args.to_vec();
    for i in 0..out.len() {
        let redact = (i > 0 && flags.contains(&args[i - 1].as_str()))
            || secrets.iter().any(|s| !s.is_empty() && *s == args[i]);
        if redact {
            "[REDACTED]".clone_into(&mut out[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use kiln_core::{rules::Rule, Arch, Os};

    use super::*;

    fn values() -> TokenValues {
        let mut values = TokenValues::default();
        values
            .set("auth_player_name", "Steve")
            .set("natives_directory", "/kiln/natives");
        values
    }

    #[test]
    fn substitution() {
        let values = values();
        assert_eq!(values.substitute("--username"), "--username");
        assert_eq!(values.substitute("${auth_player_name}"), "Steve");
        assert_eq!(
            values.substitute("-Djava.library.path=${natives_directory}"),
            "-Djava.library.path=/kiln/natives"
        );
        assert_eq!(values.substitute("${unknown} ${"), "${unknown} ${");
    }

    #[test]
    fn username_renders() {
        let rendered = render(
            &ArgumentTemplate::from_legacy_line("--username ${auth_player_name}"),
            Platform::new(Os::Linux, Arch::X86_64),
            &values(),
        );
        assert_eq!(rendered, ["--username", "Steve"]);
    }

    #[test]
    fn rule_gated_entries_are_dropped() {
        let templates = vec![
            ArgumentTemplate::Conditional {
                rules: vec![Rule::allow().on_os("osx")],
                value: kiln_core::json::ArgumentValue::One("-XstartOnFirstThread".to_owned()),
            },
            ArgumentTemplate::Conditional {
                rules: vec![Rule::allow().on_os("windows")],
                value: kiln_core::json::ArgumentValue::Many(vec![
                    "-Dos.name=Windows 10".to_owned(),
                    "-Dos.version=10.0".to_owned(),
                ]),
            },
            ArgumentTemplate::literal("-cp"),
        ];
        let mac = render(&templates, Platform::new(Os::Osx, Arch::Aarch64), &values());
        assert_eq!(mac, ["-XstartOnFirstThread", "-cp"]);
        let windows = render(&templates, Platform::new(Os::Windows, Arch::X86_64), &values());
        assert_eq!(windows, ["-Dos.name=Windows 10", "-Dos.version=10.0", "-cp"]);
    }

    #[test]
    fn demo_and_quick_play_are_removed() {
        let args: Vec<String> = [
            "--username", "Steve", "--demo", "true", "--quickPlayMultiplayer", "example.org",
            "--quickPlayPath", "/tmp/qp.json", "--width", "854",
        ]
        .map(str::to_owned)
        .to_vec();
        assert_eq!(
            strip_unwanted(args),
            ["--username", "Steve", "--width", "854"]
        );
        assert_eq!(
            strip_unwanted(vec!["--demo".to_owned()]),
            Vec::<String>::new()
        );
    }

    #[test]
    fn secrets_are_censored() {
        let args: Vec<String> = ["--accessToken", "abc", "--uuid", "1234", "--version", "1.20.1", "abc"]
            .map(str::to_owned)
            .to_vec();
        let censored = censor(&args, &["--accessToken", "--uuid"], &["abc"]);
        assert_eq!(
            censored,
            [
                "--accessToken",
                "[REDACTED]",
                "--uuid",
                "[REDACTED]",
                "--version",
                "1.20.1",
                "[REDACTED]"
            ]
        );
    }
}
