use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{EngineError, EngineResult};
use crate::core::platform::HostPlatform;

const ANY_HOST: &str = "*";

/// Substitute bytes for one library on one host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeReplacement {
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// Overrides the local path; the original path is kept otherwise.
    #[serde(default)]
    pub path: Option<String>,
}

/// Registry of compatibility substitutions, keyed by library identifier and
/// then by host key (`linux-aarch64`, `osx-aarch64`, ... or `*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NativeReplacements {
    entries: HashMap<String, HashMap<String, NativeReplacement>>,
}

impl NativeReplacements {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(EngineError::io(path))?;
        let registry: Self = serde_json::from_str(&raw)?;
        debug!("Loaded {} native replacement entries from {:?}", registry.len(), path);
        Ok(registry)
    }

    pub fn insert(
        &mut self,
        identifier: impl Into<String>,
        host_key: impl Into<String>,
        replacement: NativeReplacement,
    ) {
        self.entries
            .entry(identifier.into())
            .or_default()
            .insert(host_key.into(), replacement);
    }

    /// Exact lookup by identifier, host-specific entry before the `*` entry.
    pub fn lookup(&self, identifier: &str, host: &HostPlatform) -> Option<&NativeReplacement> {
        let by_host = self.entries.get(identifier)?;
        by_host
            .get(&host.replacement_key())
            .or_else(|| by_host.get(ANY_HOST))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{Arch, OsKind};

    #[test]
    fn lookup_prefers_host_specific_entry() {
        let registry: NativeReplacements = serde_json::from_value(serde_json::json!({
            "org.lwjgl:lwjgl:3.2.2:natives-linux": {
                "linux-aarch64": {"url": "https://example.invalid/arm.jar", "sha1": "aa"},
                "*": {"url": "https://example.invalid/any.jar", "sha1": "bb"}
            }
        }))
        .unwrap();

        let arm = HostPlatform::new(OsKind::Linux, "", Arch::Aarch64);
        let x64 = HostPlatform::new(OsKind::Linux, "", Arch::X86_64);
        let id = "org.lwjgl:lwjgl:3.2.2:natives-linux";

        assert_eq!(registry.lookup(id, &arm).unwrap().sha1, "aa");
        assert_eq!(registry.lookup(id, &x64).unwrap().sha1, "bb");
        assert!(registry.lookup("org.lwjgl:lwjgl:3.2.2", &arm).is_none());
    }
}
