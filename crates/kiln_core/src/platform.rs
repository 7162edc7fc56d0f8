//! The operating system and CPU architecture the
//! launcher (and therefore the game) runs on.
//!
//! Everything platform-specific in the pipeline takes a
//! [`Platform`] value instead of checking `cfg!` directly,
//! so the rule evaluator and the planner can be exercised
//! for any platform from any host.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Osx,
    FreeBsd,
}

impl Os {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Osx
        } else if cfg!(target_os = "freebsd") {
            Os::FreeBsd
        } else {
            Os::Linux
        }
    }

    /// The name used for this OS in version JSON rules and `natives` maps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::Osx => "osx",
            Os::FreeBsd => "freebsd",
        }
    }

    /// Every name upstream JSON may use for this OS,
    /// most canonical first.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Os::Windows => &["windows"],
            Os::Linux => &["linux"],
            Os::Osx => &["osx", "macos"],
            Os::FreeBsd => &["freebsd"],
        }
    }

    #[must_use]
    pub fn matches(self, name: &str) -> bool {
        self.aliases().contains(&name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86_64,
    X86,
    Aarch64,
    Arm,
}

impl Arch {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else {
            Arch::X86_64
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Arch::X86_64 | Arch::Aarch64 => 64,
            Arch::X86 | Arch::Arm => 32,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::X86 => "x86",
            Arch::Aarch64 => "aarch64",
            Arch::Arm => "arm",
        }
    }

    /// Matches the `os.arch` field of a rule.
    #[must_use]
    pub fn matches(self, name: &str) -> bool {
        match self {
            Arch::X86_64 => matches!(name, "x86_64" | "amd64" | "x64"),
            Arch::X86 => matches!(name, "x86" | "i386" | "i686"),
            Arch::Aarch64 => matches!(name, "aarch64" | "arm64"),
            Arch::Arm => matches!(name, "arm" | "arm32"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    #[must_use]
    pub const fn current() -> Self {
        Self::new(Os::current(), Arch::current())
    }

    /// Value of the `${arch}` token in native classifiers
    /// (`natives-windows-${arch}` becomes `natives-windows-64`).
    #[must_use]
    pub fn arch_token(self) -> String {
        self.arch.bits().to_string()
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os.name(), self.arch.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compat_key() {
        let p = Platform::new(Os::Linux, Arch::Aarch64);
        assert_eq!(p.to_string(), "linux-aarch64");
        assert_eq!(p.arch_token(), "64");
        assert_eq!(Platform::new(Os::Windows, Arch::X86).arch_token(), "32");
    }

    #[test]
    fn mac_aliases() {
        assert!(Os::Osx.matches("macos"));
        assert!(Os::Osx.matches("osx"));
        assert!(!Os::Linux.matches("osx"));
    }
}
