use std::path::PathBuf;

use tracing::{debug, warn};

use super::model::{DownloadInfo, LibraryRef, Resolution, ResolvedArtifact, ResolvedLibrary};
use super::replacements::NativeReplacements;
use crate::core::config::EngineConfig;
use crate::core::error::EngineResult;
use crate::core::hashing::ExpectedHash;
use crate::core::maven::MavenArtifact;
use crate::core::platform::HostPlatform;
use crate::core::rules::rules_allow;

/// Maps library identifiers to concrete files for a given host.
///
/// Pure: resolving the same `LibraryRef` on the same host always yields the
/// same value, and nothing touches the filesystem or network.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    default_repository: String,
    replacements: NativeReplacements,
}

impl LibraryResolver {
    pub fn new(default_repository: impl Into<String>, replacements: NativeReplacements) -> Self {
        Self {
            default_repository: default_repository.into(),
            replacements,
        }
    }

    /// Resolver configured from engine settings; the replacement registry is
    /// only loaded when enabled.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let replacements = match (&config.native_replacements_file, config.enable_native_replacements) {
            (Some(path), true) => NativeReplacements::load(path)?,
            _ => NativeReplacements::empty(),
        };
        Ok(Self::new(config.library_repository.clone(), replacements))
    }

    pub fn default_repository(&self) -> &str {
        &self.default_repository
    }

    pub fn resolve(&self, lib: &LibraryRef, host: &HostPlatform) -> Resolution {
        if !rules_allow(lib.rules.as_deref(), host) {
            debug!("Library {} excluded by rules on {}", lib.name, host);
            return Resolution::NotApplicable;
        }

        let (coordinate, degraded) = MavenArtifact::parse_lenient(&lib.name);
        if degraded {
            warn!(
                "Library identifier {:?} is malformed; continuing with opaque name {}",
                lib.name, coordinate.artifact_id
            );
        }

        let classifier = match &lib.natives {
            Some(by_os) => match by_os.get(host.os.as_str()) {
                Some(template) => Some(template.replace("${arch}", host.arch_bits())),
                None => {
                    debug!("Library {} has no natives for {}", lib.name, host.os);
                    return Resolution::NotApplicable;
                }
            },
            None => None,
        };

        // An explicit empty `url` marks a library that only ships inside an installer.
        let base = lib.url.as_deref().unwrap_or(&self.default_repository);
        let downloads = lib.downloads.as_ref();

        let artifact = match downloads {
            Some(d) => d
                .artifact
                .as_ref()
                .map(|info| from_download_info(&lib.name, info, &coordinate)),
            None if classifier.is_none() => Some(ResolvedArtifact {
                identifier: lib.name.clone(),
                local_path: coordinate.local_path(),
                remote_url: (!base.is_empty()).then(|| coordinate.url(base)),
                hash: lib.declared_hash(),
                size: lib.size,
                replaced: false,
            }),
            None => None,
        }
        .map(|a| self.apply_replacement(a, host));

        let natives = classifier.map(|classifier| {
            let identifier = format!("{}:{}", lib.name, classifier);
            let with_classifier = coordinate.with_classifier(Some(&classifier));
            let resolved = match downloads.and_then(|d| d.classifiers.get(&classifier)) {
                Some(info) => from_download_info(&identifier, info, &with_classifier),
                None => ResolvedArtifact {
                    identifier,
                    local_path: with_classifier.local_path(),
                    remote_url: (!base.is_empty()).then(|| with_classifier.url(base)),
                    hash: None,
                    size: None,
                    replaced: false,
                },
            };
            self.apply_replacement(resolved, host)
        });

        Resolution::Applicable(ResolvedLibrary {
            name: lib.name.clone(),
            artifact,
            natives,
            extract: lib.extract.clone(),
        })
    }

    /// Swap in replacement bytes for this identifier on this host, keeping
    /// the identifier. Skipped when the declared hash already matches.
    fn apply_replacement(&self, artifact: ResolvedArtifact, host: &HostPlatform) -> ResolvedArtifact {
        let Some(replacement) = self.replacements.lookup(&artifact.identifier, host) else {
            return artifact;
        };

        if artifact
            .hash
            .as_ref()
            .is_some_and(|h| h.matches(&replacement.sha1))
        {
            debug!("{} already matches its replacement", artifact.identifier);
            return artifact;
        }

        debug!(
            "Replacing {} on {} with {}",
            artifact.identifier,
            host.replacement_key(),
            replacement.url
        );
        ResolvedArtifact {
            local_path: replacement
                .path
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or(artifact.local_path),
            remote_url: Some(replacement.url.clone()),
            hash: Some(ExpectedHash::sha1(replacement.sha1.clone())),
            size: replacement.size,
            replaced: true,
            identifier: artifact.identifier,
        }
    }
}

fn from_download_info(identifier: &str, info: &DownloadInfo, coordinate: &MavenArtifact) -> ResolvedArtifact {
    ResolvedArtifact {
        identifier: identifier.to_string(),
        local_path: info
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| coordinate.local_path()),
        remote_url: info.url.clone().filter(|u| !u.is_empty()),
        hash: info
            .sha1
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(ExpectedHash::sha1),
        size: info.size,
        replaced: false,
    }
}
