use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Output, Stdio},
};

use kiln_core::{info, no_window};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::{LaunchError, ProcessSpec};

/// A running game.
///
/// Dropping the handle doesn't stop the game; use [`Self::kill`].
pub struct RunningProcessHandle {
    child: Child,
    program: PathBuf,
}

impl RunningProcessHandle {
    /// `None` once the process has been waited on.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// # Errors
    /// If the process status can't be queried.
    pub fn is_running(&mut self) -> Result<bool, LaunchError> {
        Ok(self
            .child
            .try_wait()
            .map_err(LaunchError::Process)?
            .is_none())
    }

    /// Forcibly stops the process and waits for it to exit.
    ///
    /// # Errors
    /// If the process can't be killed.
    pub async fn kill(&mut self) -> Result<(), LaunchError> {
        info!("Killing game process {:?}", self.pid());
        self.child.kill().await.map_err(LaunchError::Process)
    }

    /// # Errors
    /// If waiting on the process fails.
    pub async fn wait(&mut self) -> Result<ExitStatus, LaunchError> {
        self.child.wait().await.map_err(LaunchError::Process)
    }

    /// The captured stdout, if spawned with capture on. Can only be taken once.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// The captured stderr, if spawned with capture on. Can only be taken once.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Waits for exit, collecting whatever output was captured.
    ///
    /// # Errors
    /// If waiting on the process fails.
    pub async fn wait_with_output(self) -> Result<Output, LaunchError> {
        self.child
            .wait_with_output()
            .await
            .map_err(LaunchError::Process)
    }
}

/// Starts `spec`. With `capture`, stdout and stderr are piped
/// and can be read from the handle; otherwise they're inherited.
///
/// # Errors
/// - [`LaunchError::RuntimeNotFound`] if the executable doesn't exist
/// - [`LaunchError::Spawn`] for any other spawn failure
pub fn spawn(spec: &ProcessSpec, capture: bool) -> Result<RunningProcessHandle, LaunchError> {
    if spec.program.is_absolute() && !spec.program.is_file() {
        return Err(LaunchError::RuntimeNotFound(spec.program.clone()));
    }

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(&spec.env)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .kill_on_drop(false);
    no_window!(command);
    if capture {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    let child = command.spawn().map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            LaunchError::RuntimeNotFound(spec.program.clone())
        } else {
            LaunchError::Spawn {
                program: spec.program.clone(),
                error,
            }
        }
    })?;

    Ok(RunningProcessHandle {
        child,
        program: spec.program.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn spec(program: PathBuf, args: &[&str], cwd: &Path) -> ProcessSpec {
        ProcessSpec {
            program,
            args: args.iter().map(|s| (*s).to_owned()).collect(),
            env: BTreeMap::from([("KILN_TEST".to_owned(), "yes".to_owned())]),
            cwd: cwd.to_owned(),
            secrets: Vec::new(),
        }
    }

    #[tokio::test]
    async fn missing_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn(
            &spec(dir.path().join("bin/java"), &[], dir.path()),
            false,
        );
        assert!(matches!(result, Err(LaunchError::RuntimeNotFound(_))));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-java");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_output_with_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), r#"echo "$1 $KILN_TEST $(basename "$PWD")""#);
        let cwd = dir.path().join("game");
        std::fs::create_dir_all(&cwd).unwrap();

        let handle = spawn(&spec(program, &["hello"], &cwd), true).unwrap();
        assert!(handle.pid().is_some());
        let output = handle.wait_with_output().await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello yes game\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_stops_the_game() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 30");

        let mut handle = spawn(&spec(program, &[], dir.path()), false).unwrap();
        assert!(handle.is_running().unwrap());
        handle.kill().await.unwrap();
        assert!(!handle.is_running().unwrap());
    }

    #[cfg(windows)]
    #[tokio::test]
    async fn uncaptured_spawn_runs_detached() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = spawn(
            &spec(PathBuf::from("cmd"), &["/C", "exit", "0"], dir.path()),
            false,
        )
        .unwrap();
        assert!(handle.take_stdout().is_none());
        assert!(handle.wait().await.unwrap().success());
    }
}
