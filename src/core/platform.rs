// ─── Host Platform ───
// Describes the machine an install targets: OS family, OS version, CPU arch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// OS family using the manifest naming (`windows`, `osx`, `linux`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    Windows,
    Osx,
    Linux,
}

impl OsKind {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsKind::Windows
        } else if cfg!(target_os = "macos") {
            OsKind::Osx
        } else {
            OsKind::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsKind::Windows => "windows",
            OsKind::Osx => "osx",
            OsKind::Linux => "linux",
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X86_64,
    Arm,
    Aarch64,
}

impl Arch {
    pub fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else {
            Arch::X86
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Arm => "arm",
            Arch::Aarch64 => "aarch64",
        }
    }

    pub fn is_arm(&self) -> bool {
        matches!(self, Arch::Arm | Arch::Aarch64)
    }

    pub fn is_64_bit(&self) -> bool {
        matches!(self, Arch::X86_64 | Arch::Aarch64)
    }
}

/// Everything the resolver and rule evaluator need to know about the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostPlatform {
    pub os: OsKind,
    pub os_version: String,
    pub arch: Arch,
}

impl HostPlatform {
    pub fn new(os: OsKind, os_version: impl Into<String>, arch: Arch) -> Self {
        Self {
            os,
            os_version: os_version.into(),
            arch,
        }
    }

    /// Detect the platform this process runs on.
    pub fn current() -> Self {
        let os_version = sysinfo::System::os_version().unwrap_or_default();
        Self::new(OsKind::current(), os_version, Arch::current())
    }

    /// Value for the `${arch}` token in natives classifiers.
    pub fn arch_bits(&self) -> &'static str {
        if self.arch.is_64_bit() {
            "64"
        } else {
            "32"
        }
    }

    /// Key used by the native replacement registry (e.g. `linux-aarch64`).
    pub fn replacement_key(&self) -> String {
        format!("{}-{}", self.os, self.arch.as_str())
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.os, self.os_version, self.arch.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_bits_follow_pointer_width() {
        let host = HostPlatform::new(OsKind::Linux, "6.1", Arch::Aarch64);
        assert_eq!(host.arch_bits(), "64");
        assert!(host.arch.is_arm());

        let host = HostPlatform::new(OsKind::Windows, "10", Arch::X86);
        assert_eq!(host.arch_bits(), "32");
    }

    #[test]
    fn replacement_key_joins_os_and_arch() {
        let host = HostPlatform::new(OsKind::Linux, "", Arch::Aarch64);
        assert_eq!(host.replacement_key(), "linux-aarch64");
    }

    #[test]
    fn os_names_match_manifest_spelling() {
        let parsed: OsKind = serde_json::from_str("\"osx\"").unwrap();
        assert_eq!(parsed, OsKind::Osx);
        assert_eq!(OsKind::Windows.to_string(), "windows");
    }
}
