use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{EngineError, EngineResult};
use crate::core::maven::{FORGE_MAVEN, MOJANG_LIBRARIES};

const APP_DIR_NAME: &str = "Packsmith";
const SETTINGS_FILE: &str = "engine_settings.json";

/// Engine configuration, persisted as `engine_settings.json` in the data dir.
///
/// Passed explicitly into every session; nothing in the engine reaches for a
/// global settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub user_downloads_dir: Option<PathBuf>,
    pub library_repository: String,
    pub loader_repository: String,
    pub download_concurrency: usize,
    pub java_path: Option<PathBuf>,
    pub browser_poll_interval_ms: u64,
    pub enable_native_replacements: bool,
    pub native_replacements_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            user_downloads_dir: dirs::download_dir(),
            library_repository: MOJANG_LIBRARIES.to_string(),
            loader_repository: FORGE_MAVEN.to_string(),
            download_concurrency: 8,
            java_path: None,
            browser_poll_interval_ms: 1000,
            enable_native_replacements: true,
            native_replacements_file: None,
        }
    }
}

impl EngineConfig {
    /// Config rooted at an explicit data directory, other fields defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<EngineConfig>(&raw) {
                Ok(cfg) => {
                    debug!("Loaded engine settings from {:?}", path);
                    cfg
                }
                Err(e) => {
                    warn!("Ignoring unreadable settings at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Load `engine_settings.json` from the default data directory.
    pub fn load_from_data_dir() -> Self {
        Self::load_or_default(&default_data_dir().join(SETTINGS_FILE))
    }

    pub fn save(&self) -> EngineResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(EngineError::io(&self.data_dir))?;
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(EngineError::io(&path))
    }

    /// Shared Maven-layout library cache.
    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Launcher-managed download cache; also the staging area for
    /// browser-assisted downloads.
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn loaders_dir(&self) -> PathBuf {
        self.data_dir.join("loaders")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp")
    }

    pub fn concurrency(&self) -> usize {
        self.download_concurrency.max(1)
    }

    /// Java binary used for loader processors.
    ///
    /// Explicit setting, then `JAVA_HOME`, then whatever `java` is on `PATH`.
    pub fn java_binary(&self) -> PathBuf {
        if let Some(path) = &self.java_path {
            return path.clone();
        }

        let exe = if cfg!(target_os = "windows") {
            "java.exe"
        } else {
            "java"
        };

        if let Some(home) = std::env::var_os("JAVA_HOME") {
            let candidate = PathBuf::from(home).join("bin").join(exe);
            if candidate.is_file() {
                return candidate;
            }
        }

        PathBuf::from(exe)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load_or_default(&dir.path().join("nope.json"));
        assert_eq!(cfg.download_concurrency, 8);
        assert_eq!(cfg.library_repository, MOJANG_LIBRARIES);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine_settings.json");
        std::fs::write(&path, r#"{"download_concurrency": 2}"#).unwrap();

        let cfg = EngineConfig::load_or_default(&path);
        assert_eq!(cfg.download_concurrency, 2);
        assert_eq!(cfg.browser_poll_interval_ms, 1000);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = EngineConfig::with_data_dir(dir.path());
        cfg.download_concurrency = 3;
        cfg.save().unwrap();

        let loaded = EngineConfig::load_or_default(&dir.path().join(SETTINGS_FILE));
        assert_eq!(loaded.download_concurrency, 3);
        assert_eq!(loaded.libraries_dir(), dir.path().join("libraries"));
    }

    #[test]
    fn concurrency_never_zero() {
        let mut cfg = EngineConfig::with_data_dir("/tmp/x");
        cfg.download_concurrency = 0;
        assert_eq!(cfg.concurrency(), 1);
    }
}
