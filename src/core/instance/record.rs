use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::error::{EngineError, EngineResult};
use crate::core::manifest::ModKind;
use crate::core::session::Side;

/// One placed mod as remembered after install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledMod {
    pub name: String,
    pub kind: ModKind,
    /// Final location, relative to the instance root when possible.
    pub file: PathBuf,
}

/// Summary of a completed install, persisted as `instance.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRecord {
    pub id: String,
    pub pack: String,
    pub version: String,
    pub game_version: String,
    pub side: Side,
    pub installed_at: DateTime<Utc>,

    // ── Loader ──
    /// Main class resolved from the loader profile.
    pub main_class: Option<String>,
    pub libraries: Vec<String>,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,

    // ── Content ──
    pub mods: Vec<InstalledMod>,
    pub jar_order: Vec<String>,
}

impl InstallRecord {
    pub fn new(
        pack: impl Into<String>,
        version: impl Into<String>,
        game_version: impl Into<String>,
        side: Side,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pack: pack.into(),
            version: version.into(),
            game_version: game_version.into(),
            side,
            installed_at: Utc::now(),
            main_class: None,
            libraries: Vec::new(),
            jvm_args: Vec::new(),
            game_args: Vec::new(),
            mods: Vec::new(),
            jar_order: Vec::new(),
        }
    }

    pub async fn save(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(EngineError::io(parent))?;
        }

        tokio::fs::write(path, json)
            .await
            .map_err(EngineError::io(path))
    }

    pub async fn load(path: &Path) -> EngineResult<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(EngineError::io(path))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.json");

        let mut record = InstallRecord::new("Skyfactory", "4.2.4", "1.12.2", Side::Client);
        record.jar_order.push("forge.zip".into());
        record.mods.push(InstalledMod {
            name: "JEI".into(),
            kind: ModKind::Mods,
            file: PathBuf::from("mods/jei.jar"),
        });
        record.save(&path).await.unwrap();

        let loaded = InstallRecord::load(&path).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.mods, record.mods);
        assert_eq!(loaded.jar_order, vec!["forge.zip"]);
        assert!(Uuid::parse_str(&loaded.id).is_ok());
    }
}
