use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::{EngineError, EngineResult};

/// A library identifier split into its Maven parts.
///
/// Accepted shapes: `group:artifact:version`, with an optional `:classifier`
/// and an optional `@extension` suffix (`jar` when absent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension, `"jar"` unless overridden with `@ext`.
    pub packaging: String,
}

impl MavenArtifact {
    /// Strict parse. Anything other than three or four non-empty segments is
    /// [`EngineError::UnresolvableLibrary`].
    ///
    /// ```
    /// use packsmith_lib::core::maven::MavenArtifact;
    /// let a = MavenArtifact::parse("de.oceanlabs.mcp:mcp_config:1.20.1@zip").unwrap();
    /// assert_eq!(a.filename(), "mcp_config-1.20.1.zip");
    /// ```
    pub fn parse(identifier: &str) -> EngineResult<Self> {
        let unresolvable = || EngineError::UnresolvableLibrary(identifier.to_string());

        let (coordinate, packaging) = match identifier.rsplit_once('@') {
            Some((head, ext)) if !ext.is_empty() => (head, ext),
            Some(_) => return Err(unresolvable()),
            None => (identifier, "jar"),
        };

        let segments: Vec<&str> = coordinate.split(':').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(unresolvable());
        }
        let (group, artifact, version, classifier) = match segments.as_slice() {
            [g, a, v] => (*g, *a, *v, None),
            [g, a, v, c] => (*g, *a, *v, Some(c.to_string())),
            _ => return Err(unresolvable()),
        };

        Ok(Self {
            group_id: group.to_string(),
            artifact_id: artifact.to_string(),
            version: version.to_string(),
            classifier,
            packaging: packaging.to_string(),
        })
    }

    /// Never fails: a malformed identifier becomes an opaque artifact named
    /// after the whole string, version `"0"`, no group. The flag is `true`
    /// when that fallback was used.
    pub fn parse_lenient(identifier: &str) -> (Self, bool) {
        if let Ok(artifact) = Self::parse(identifier) {
            return (artifact, false);
        }
        let opaque = Self {
            group_id: String::new(),
            artifact_id: opaque_name(identifier),
            version: "0".to_string(),
            classifier: None,
            packaging: "jar".to_string(),
        };
        (opaque, true)
    }

    /// `artifact-version[-classifier].ext`
    pub fn filename(&self) -> String {
        let mut name = format!("{}-{}", self.artifact_id, self.version);
        if let Some(classifier) = &self.classifier {
            name.push('-');
            name.push_str(classifier);
        }
        name.push('.');
        name.push_str(&self.packaging);
        name
    }

    fn segments(&self) -> impl Iterator<Item = String> + '_ {
        self.group_id
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .chain([
                self.artifact_id.clone(),
                self.version.clone(),
                self.filename(),
            ])
    }

    /// Download URL under a repository base; a trailing `/` on the base is
    /// ignored.
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}",
            repo_base.trim_end_matches('/'),
            self.relative_url_path()
        )
    }

    /// Forward-slash repository path, whatever the host separator.
    pub fn relative_url_path(&self) -> String {
        self.segments().collect::<Vec<_>>().join("/")
    }

    /// Path relative to a libraries directory.
    pub fn local_path(&self) -> PathBuf {
        self.segments().collect()
    }

    pub fn path_in(&self, libs_dir: &Path) -> PathBuf {
        libs_dir.join(self.local_path())
    }

    pub fn with_classifier(&self, classifier: Option<&str>) -> Self {
        Self {
            classifier: classifier.map(str::to_string),
            ..self.clone()
        }
    }
}

fn opaque_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, ':' | '/' | '\\' | '@') { '_' } else { c })
        .collect();
    if cleaned.trim().is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if self.packaging != "jar" {
            write!(f, "@{}", self.packaging)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_and_four_segment_identifiers() {
        let plain = MavenArtifact::parse("com.google.guava:guava:21.0").unwrap();
        assert_eq!(
            (plain.group_id.as_str(), plain.artifact_id.as_str(), plain.version.as_str()),
            ("com.google.guava", "guava", "21.0")
        );
        assert_eq!(plain.classifier, None);
        assert_eq!(plain.packaging, "jar");

        let natives = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap();
        assert_eq!(natives.classifier.as_deref(), Some("natives-linux"));
        assert_eq!(natives.to_string(), "org.lwjgl:lwjgl:3.3.1:natives-linux");
    }

    #[test]
    fn extension_suffix_changes_the_file_name() {
        let a = MavenArtifact::parse("net.minecraftforge:forge:1.20.1-47.2.0:installer@jar").unwrap();
        assert_eq!(a.filename(), "forge-1.20.1-47.2.0-installer.jar");

        let zip = MavenArtifact::parse("de.oceanlabs.mcp:mcp_config:1.20.1@zip").unwrap();
        assert_eq!(zip.to_string(), "de.oceanlabs.mcp:mcp_config:1.20.1@zip");
    }

    #[test]
    fn malformed_identifiers_are_unresolvable() {
        for bad in ["justaname", "a::1", "a:b:c:d:e", "a:b:1@"] {
            assert!(
                matches!(MavenArtifact::parse(bad), Err(EngineError::UnresolvableLibrary(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn lenient_parse_keeps_going_with_an_opaque_name() {
        let (a, degraded) = MavenArtifact::parse_lenient("legacy-lib");
        assert!(degraded);
        assert_eq!(a.local_path(), PathBuf::from("legacy-lib/0/legacy-lib-0.jar"));

        let (b, degraded) = MavenArtifact::parse_lenient("weird/name:x");
        assert!(degraded);
        assert_eq!(b.artifact_id, "weird_name_x");

        assert!(!MavenArtifact::parse_lenient("org.lwjgl:lwjgl:3.3.1").1);
    }

    #[test]
    fn repository_and_local_layouts_agree() {
        let a = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap();
        assert_eq!(
            a.url("https://libraries.minecraft.net/"),
            "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar"
        );
        assert_eq!(
            a.local_path(),
            PathBuf::from("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar")
        );
        assert_eq!(
            a.with_classifier(None).path_in(Path::new("/libs")),
            PathBuf::from("/libs/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar")
        );
    }
}
