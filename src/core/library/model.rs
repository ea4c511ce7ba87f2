use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::hashing::ExpectedHash;
use crate::core::rules::Rule;

/// A library entry as it appears in a version manifest or loader profile.
///
/// Accepts both the Mojang shape (`downloads.artifact` / `downloads.classifiers`)
/// and the bare `name` + `url` shape used by older loader profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryRef {
    pub name: String,
    /// Repository base URL overriding the default one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// Legacy Forge form; a single entry is the artifact's SHA-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksums: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// OS name → natives classifier (may contain `${arch}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractSpec>,
}

impl LibraryRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declared hash of the main artifact, if any (SHA-1 preferred).
    pub fn declared_hash(&self) -> Option<ExpectedHash> {
        if let Some(sha1) = self.sha1.as_deref().filter(|s| !s.is_empty()) {
            return Some(ExpectedHash::sha1(sha1));
        }
        if let Some([sha1]) = self.checksums.as_deref() {
            if !sha1.is_empty() {
                return Some(ExpectedHash::sha1(sha1));
            }
        }
        self.md5
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(ExpectedHash::md5)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<DownloadInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifiers: BTreeMap<String, DownloadInfo>,
}

/// Explicit download coordinates from a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadInfo {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractSpec {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A concrete file: where it lives locally and where it can be fetched from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResolvedArtifact {
    /// Logical library name; unchanged by native replacements.
    pub identifier: String,
    /// Path relative to the libraries directory.
    pub local_path: PathBuf,
    /// `None` when the artifact is not fetchable and must be bundled.
    pub remote_url: Option<String>,
    pub hash: Option<ExpectedHash>,
    pub size: Option<u64>,
    /// Whether a native replacement supplied the bytes.
    pub replaced: bool,
}

impl ResolvedArtifact {
    pub fn path_in(&self, libs_dir: &Path) -> PathBuf {
        libs_dir.join(&self.local_path)
    }

    /// Forward-slash form of `local_path`, as used inside installer archives.
    pub fn relative_url_path(&self) -> String {
        self.local_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A library that applies to the host, split into its downloadable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub name: String,
    /// Main jar. Natives-only libraries have none.
    pub artifact: Option<ResolvedArtifact>,
    /// Host natives classifier jar.
    pub natives: Option<ResolvedArtifact>,
    pub extract: Option<ExtractSpec>,
}

impl ResolvedLibrary {
    pub fn artifacts(&self) -> impl Iterator<Item = &ResolvedArtifact> {
        self.artifact.iter().chain(self.natives.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applicable(ResolvedLibrary),
    /// Excluded by rules or missing natives for this OS. Not an error.
    NotApplicable,
}

impl Resolution {
    pub fn applicable(self) -> Option<ResolvedLibrary> {
        match self {
            Resolution::Applicable(lib) => Some(lib),
            Resolution::NotApplicable => None,
        }
    }
}
