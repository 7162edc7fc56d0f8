//! Building the game's command line and starting it.

use std::{collections::BTreeMap, fmt::Display, path::PathBuf};

use kiln_core::{
    config::LauncherConfig, download::Downloader, info, json::VersionDescriptor, IntoIoError,
    LauncherDirs, Platform, ProgressSender,
};
use kiln_java_handler::RuntimeInfo;

mod args;
mod error;
mod process;

pub use args::{censor, render, strip_unwanted, TokenSource, TokenValues};
pub use error::LaunchError;
pub use process::{spawn, RunningProcessHandle};

use crate::{
    download,
    natives::extract_natives,
    record::{EffectiveSettings, InstallLayout, InstallationRecord},
};

/// Flags whose following argument is a secret.
const SECRET_FLAGS: &[&str] = &["--accessToken", "--uuid", "--session"];

/// An offline-mode UUID, for the "no account" case.
pub const ZERO_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Who's playing. Produced by whatever handles accounts;
/// only [`Credentials::offline`] is built in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    /// `msa`, `mojang` or `legacy`.
    pub user_type: String,
}

impl Credentials {
    #[must_use]
    pub fn offline(username: &str) -> Self {
        Self {
            username: username.to_owned(),
            uuid: ZERO_UUID.to_owned(),
            access_token: "0".to_owned(),
            user_type: "legacy".to_owned(),
        }
    }

    /// # Errors
    /// If the username is empty or contains spaces.
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.username.is_empty() {
            return Err(LaunchError::UsernameIsEmpty);
        }
        if self.username.contains(' ') {
            return Err(LaunchError::UsernameHasSpaces);
        }
        Ok(())
    }
}

/// A fully rendered command, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added on top of the launcher's own environment.
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    /// Values to hide when the command is displayed.
    pub secrets: Vec<String>,
}

/// Shows the command line with tokens and UUIDs redacted.
impl Display for ProcessSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secrets: Vec<&str> = self
            .secrets
            .iter()
            .map(String::as_str)
            .filter(|s| s.len() > 1)
            .collect();
        write!(f, "{}", self.program.display())?;
        for arg in censor(&self.args, SECRET_FLAGS, &secrets) {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

pub struct LaunchInputs<'a> {
    pub dirs: &'a LauncherDirs,
    pub layout: &'a InstallLayout,
    pub runtime: &'a RuntimeInfo,
    pub credentials: &'a Credentials,
    pub settings: &'a EffectiveSettings,
    pub platform: Platform,
}

/// Renders the command line for `descriptor`:
/// JVM arguments, logging config, heap size, user JVM arguments,
/// main class, then game arguments.
///
/// # Errors
/// If the credentials are invalid.
pub fn build(descriptor: &VersionDescriptor, inputs: &LaunchInputs<'_>) -> Result<ProcessSpec, LaunchError> {
    inputs.credentials.validate()?;
    let dirs = inputs.dirs;
    let plan = download::plan(descriptor, inputs.platform, dirs);

    let assets_dir = dirs.assets();
    let virtual_assets_dir = dirs.virtual_assets(&descriptor.asset_index.id);
    let libraries_dir = dirs.libraries();
    let values = TokenValues::build(&TokenSource {
        descriptor,
        username: &inputs.credentials.username,
        uuid: &inputs.credentials.uuid,
        access_token: &inputs.credentials.access_token,
        user_type: &inputs.credentials.user_type,
        game_dir: &inputs.layout.game_dir,
        assets_dir: &assets_dir,
        virtual_assets_dir: &virtual_assets_dir,
        libraries_dir: &libraries_dir,
        natives_dir: &inputs.layout.natives_dir,
        classpath: &plan.classpath,
        window_width: inputs.settings.window_width,
        window_height: inputs.settings.window_height,
    });

    let mut args = render(&descriptor.jvm_arguments, inputs.platform, &values);
    if let Some(logging) = &descriptor.logging {
        let path = dirs.log_configs().join(&logging.id);
        args.push(
            logging
                .argument
                .replace("${path}", &path.to_string_lossy()),
        );
    }
    args.push(format!("-Xmx{}M", inputs.settings.ram_in_mb));
    args.extend(
        inputs
            .settings
            .java_args
            .iter()
            .filter(|arg| !arg.is_empty())
            .cloned(),
    );
    args.push(descriptor.main_class.clone());
    args.extend(strip_unwanted(render(
        &descriptor.game_arguments,
        inputs.platform,
        &values,
    )));

    Ok(ProcessSpec {
        program: inputs.runtime.path.clone(),
        args,
        env: inputs.settings.env_vars.clone(),
        cwd: inputs.layout.game_dir.clone(),
        secrets: vec![
            inputs.credentials.access_token.clone(),
            inputs.credentials.uuid.clone(),
        ],
    })
}

/// The runtime `descriptor` wants: its own `javaVersion` if it has one,
/// else the one recommended for its game version. Installed if missing.
///
/// # Errors
/// If no runtime fits and installing one fails.
pub async fn select_runtime(
    descriptor: &VersionDescriptor,
    settings: &EffectiveSettings,
    dirs: &LauncherDirs,
    config: &LauncherConfig,
    downloader: &Downloader,
    progress: &ProgressSender,
) -> Result<RuntimeInfo, LaunchError> {
    let major = descriptor
        .java_version
        .unwrap_or_else(|| kiln_java_handler::recommend(&descriptor.game_version));
    Ok(kiln_java_handler::find_or_install(
        major,
        settings.java_override.as_deref(),
        dirs,
        &config.endpoints,
        downloader,
        progress,
    )
    .await?)
}

/// Extracts natives, builds the command line and starts the game.
///
/// The game keeps running when the returned handle is dropped.
///
/// # Errors
/// - invalid credentials
/// - a native jar is missing or invalid
/// - the runtime can't be started
pub async fn launch(
    descriptor: &VersionDescriptor,
    record: &InstallationRecord,
    runtime: &RuntimeInfo,
    credentials: &Credentials,
    dirs: &LauncherDirs,
    config: &LauncherConfig,
    capture: bool,
) -> Result<RunningProcessHandle, LaunchError> {
    credentials.validate()?;
    let platform = Platform::current();
    let layout = record.layout(dirs);
    let settings = record.effective(config);
    tokio::fs::create_dir_all(&layout.game_dir)
        .await
        .path(&layout.game_dir)?;

    let plan = download::plan(descriptor, platform, dirs);
    let extracted = extract_natives(&plan.natives, &layout.natives_dir).await?;
    info!("Extracted {extracted} native files");

    let spec = build(
        descriptor,
        &LaunchInputs {
            dirs,
            layout: &layout,
            runtime,
            credentials,
            settings: &settings,
            platform,
        },
    )?;
    info!("Launching {} with {runtime}", descriptor.id);
    info!("Command: {spec}");
    spawn(&spec, capture)
}
