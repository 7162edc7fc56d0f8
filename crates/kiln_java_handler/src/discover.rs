//! Finding Java runtimes that are already installed.
//!
//! Every candidate executable is run with
//! `-XshowSettings:properties -version` under a short timeout.
//! Anything that hangs, crashes or prints something unexpected
//! is quietly left out; discovery itself never fails.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use kiln_core::{do_jobs, no_window, pt, LauncherDirs};

use crate::{get_java_binary, RuntimeInfo, Runtimes, JAVA_BIN};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const WALK_DEPTH: usize = 5;

/// Lists the runtimes on this machine: ones found
/// on the system and ones in the launcher's `java_installs`.
pub async fn discover(dirs: &LauncherDirs) -> Runtimes {
    let managed = discover_managed(dirs).await;
    let taken: HashSet<PathBuf> = managed.iter().map(|r| r.path.clone()).collect();

    let system = discover_system()
        .await
        .into_iter()
        .filter(|r| !taken.contains(&r.path))
        .collect();

    Runtimes { system, managed }
}

/// Runtimes the launcher installed itself (deletable).
/// Unfinished installs (with an `install.lock`) are skipped.
pub async fn discover_managed(dirs: &LauncherDirs) -> Vec<RuntimeInfo> {
    let installs = dirs.java_installs();
    let Ok(mut entries) = tokio::fs::read_dir(&installs).await else {
        return Vec::new();
    };

    let mut binaries = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let dir = entry.path();
        if !dir.is_dir() || dir.join("install.lock").exists() {
            continue;
        }
        if let Ok(java) = get_java_binary(&dir) {
            binaries.push(java);
        }
    }

    let mut runtimes = probe_all(binaries).await;
    for runtime in &mut runtimes {
        runtime.managed = true;
    }
    runtimes.sort_by(|a, b| b.major.cmp(&a.major));
    runtimes
}

/// Runtimes installed by the user or the OS (never deleted by us).
pub async fn discover_system() -> Vec<RuntimeInfo> {
    let candidates = tokio::task::spawn_blocking(system_candidates)
        .await
        .unwrap_or_default();
    let mut runtimes = probe_all(candidates).await;
    runtimes.sort_by(|a, b| b.major.cmp(&a.major).then_with(|| a.path.cmp(&b.path)));
    runtimes
}

async fn probe_all(candidates: Vec<PathBuf>) -> Vec<RuntimeInfo> {
    let jobs = candidates
        .iter()
        .map(|path| async move { Ok::<_, std::convert::Infallible>(probe(path).await) });
    let probed = do_jobs(jobs).await.unwrap_or_default();

    let mut seen = HashSet::new();
    probed
        .into_iter()
        .flatten()
        .filter(|runtime| seen.insert(runtime.path.clone()))
        .collect()
}

/// Runs `java` and reads its version, vendor and bit-width.
/// `None` if it doesn't answer within [`PROBE_TIMEOUT`]
/// or the output makes no sense.
pub async fn probe(java: &Path) -> Option<RuntimeInfo> {
    probe_with_timeout(java, PROBE_TIMEOUT).await
}

pub async fn probe_with_timeout(java: &Path, timeout: Duration) -> Option<RuntimeInfo> {
    let mut command = tokio::process::Command::new(java);
    command
        .args(["-XshowSettings:properties", "-version"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    no_window!(command);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(_)) => return None,
        Err(_) => {
            pt!("{java:?} didn't answer in time, skipping");
            return None;
        }
    };

    // `-version` prints to stderr, but some wrappers use stdout.
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let parsed = parse_probe_output(&text)?;

    let path = std::fs::canonicalize(java).unwrap_or_else(|_| java.to_owned());
    Some(RuntimeInfo {
        path,
        major: parsed.major,
        version: parsed.version,
        vendor: parsed.vendor,
        bits: parsed.bits,
        managed: false,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ProbeOutput {
    pub version: String,
    pub major: u32,
    pub vendor: String,
    pub bits: u8,
}

pub(crate) fn parse_probe_output(text: &str) -> Option<ProbeOutput> {
    let property = |key: &str| {
        text.lines().find_map(|line| {
            let (k, v) = line.trim().split_once(" = ")?;
            (k == key).then(|| v.trim().to_owned())
        })
    };

    let version = property("java.version").or_else(|| quoted_version(text))?;
    let major = parse_major(&version)?;

    let vendor = property("java.vendor").unwrap_or_else(|| "Unknown".to_owned());
    let bits = match property("sun.arch.data.model").as_deref() {
        Some("32") => 32,
        Some("64") => 64,
        _ => match property("os.arch") {
            Some(arch) if arch.contains("64") => 64,
            Some(_) => 32,
            None if text.contains("64-Bit") => 64,
            None => 32,
        },
    };

    Some(ProbeOutput {
        version,
        major,
        vendor,
        bits,
    })
}

/// `openjdk version "17.0.8" 2023-07-18` -> `17.0.8`
fn quoted_version(text: &str) -> Option<String> {
    text.lines()
        .filter(|line| line.contains(" version "))
        .find_map(|line| {
            let start = line.find('"')? + 1;
            let len = line[start..].find('"')?;
            Some(line[start..start + len].to_owned())
        })
}

/// `1.8.0_382` -> 8, `17.0.8` -> 17, `21-ea` -> 21
pub(crate) fn parse_major(version: &str) -> Option<u32> {
    let mut parts = version.split(['.', '-', '+', '_']);
    let first: u32 = parts.next()?.parse().ok()?;
    if first == 1 {
        parts.next()?.parse().ok()
    } else {
        Some(first)
    }
}

fn system_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        candidates.push(PathBuf::from(home).join("bin").join(JAVA_BIN));
    }
    if let Some(path) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&path).map(|dir| dir.join(JAVA_BIN)));
    }
    for root in known_roots() {
        candidates.extend(walk_for_java(&root));
    }

    candidates.retain(|p| p.is_file());
    candidates
}

fn known_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let program_files = std::env::var_os("ProgramFiles")
            .map_or_else(|| PathBuf::from(r"C:\Program Files"), PathBuf::from);
        [
            "Java",
            "Eclipse Adoptium",
            "Eclipse Foundation",
            "Zulu",
            "Microsoft",
            "Amazon Corretto",
            "BellSoft",
        ]
        .iter()
        .map(|vendor| program_files.join(vendor))
        .collect()
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Library/Java/JavaVirtualMachines")]
    } else {
        [
            "/usr/lib/jvm",
            "/usr/lib64/jvm",
            "/usr/java",
            "/usr/local/java",
            "/opt/java",
            "/opt/jdk",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    };

    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".jdks"));
        roots.push(home.join(".sdkman/candidates/java"));
        if cfg!(target_os = "macos") {
            roots.push(home.join("Library/Java/JavaVirtualMachines"));
        }
    }
    roots.retain(|r| r.is_dir());
    roots
}

/// `<root>/**/bin/java`, skipping the nested `jre/bin/java`
/// of old JDKs (it's the same runtime as the outer one).
fn walk_for_java(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .max_depth(WALK_DEPTH)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.file_name().is_some_and(|n| n == JAVA_BIN)
                && path
                    .parent()
                    .and_then(Path::file_name)
                    .is_some_and(|n| n == "bin")
        })
        .filter(|path| !is_nested_jre(path))
        .collect()
}

fn is_nested_jre(java: &Path) -> bool {
    let Some(jre) = java.parent().and_then(Path::parent) else {
        return false;
    };
    jre.file_name().is_some_and(|n| n == "jre")
        && jre
            .parent()
            .is_some_and(|jdk| jdk.join("bin").join(JAVA_BIN).is_file())
}
