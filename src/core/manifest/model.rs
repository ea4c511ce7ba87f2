use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::downloader::FilePreference;
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::ExpectedHash;
use crate::core::library::LibraryRef;
use crate::core::session::Side;

/// One version of a pack: everything the engine needs to install it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackVersion {
    #[serde(default)]
    pub pack: String,
    pub version: String,
    /// Game version, e.g. `1.12.2`.
    pub minecraft: String,
    /// Overrides the version-derived core-mods decision.
    #[serde(default)]
    pub uses_coremods: Option<bool>,
    #[serde(default)]
    pub loader: Option<LoaderSpec>,
    #[serde(default)]
    pub libraries: Vec<LibraryRef>,
    #[serde(default)]
    pub mods: Vec<ModRef>,
    #[serde(default)]
    pub actions: Vec<ActionRef>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexRef>,
    /// Vanilla game jars, keyed by side.
    #[serde(default)]
    pub downloads: Option<GameDownloads>,
}

impl PackVersion {
    pub async fn load(path: &Path) -> EngineResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(EngineError::io(path))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Whether this game version still loads a separate `coremods/` folder
    /// (everything before 1.6).
    pub fn uses_coremods(&self) -> bool {
        if let Some(explicit) = self.uses_coremods {
            return explicit;
        }
        let mut parts = self.minecraft.split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts
            .next()
            .and_then(|p| p.split(|c: char| !c.is_ascii_digit()).next())
            .and_then(|p| p.parse::<u32>().ok());
        matches!((major, minor), (Some(1), Some(m)) if m < 6)
    }

    pub fn mod_by_name(&self, name: &str) -> Option<&ModRef> {
        self.mods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameDownloads {
    #[serde(default)]
    pub client: Option<GameJar>,
    #[serde(default)]
    pub server: Option<GameJar>,
}

impl GameDownloads {
    pub fn for_side(&self, side: Side) -> Option<&GameJar> {
        match side {
            Side::Client => self.client.as_ref(),
            Side::Server => self.server.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameJar {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

// ─── Loader ───

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    #[default]
    Forge,
}

/// Loader to install, e.g. Forge `14.23.5.2860` for `1.12.2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderSpec {
    #[serde(default, rename = "type")]
    pub kind: LoaderKind,
    pub version: String,
    /// Game version the loader targets; defaults to the pack's.
    #[serde(default)]
    pub minecraft: Option<String>,
    /// Explicit installer URL instead of the loader repository layout.
    #[serde(default)]
    pub installer_url: Option<String>,
    #[serde(default)]
    pub installer_sha1: Option<String>,
}

impl LoaderSpec {
    /// Maven identifier of the loader's installer jar.
    pub fn installer_identifier(&self, game_version: &str) -> String {
        let minecraft = self.minecraft.as_deref().unwrap_or(game_version);
        match self.kind {
            LoaderKind::Forge => format!(
                "net.minecraftforge:forge:{}-{}:installer",
                minecraft, self.version
            ),
        }
    }
}

// ─── Mods ───

/// Every mod kind the registry knows how to place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModKind {
    Jar,
    #[serde(alias = "depandency")]
    Dependency,
    Forge,
    Mcpc,
    Mods,
    Plugins,
    Ic2lib,
    Denlib,
    Flan,
    Coremods,
    Extract,
    Decomp,
    Millenaire,
    Texturepack,
    Resourcepack,
    Texturepackextract,
    Resourcepackextract,
    Shaderpack,
    Rename,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    #[default]
    Direct,
    Server,
    Browser,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileCheck {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractTo {
    Mods,
    Coremods,
    Root,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecompType {
    Mods,
    Coremods,
    Jar,
    Root,
}

fn yes() -> bool {
    true
}

/// One entry in a pack's mod list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModRef {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ModKind,

    // ── File ──
    #[serde(default)]
    pub url: Option<String>,
    /// File name, or a regex when `file_pattern` is set.
    pub file: String,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default, alias = "filesize")]
    pub size: Option<u64>,
    #[serde(default)]
    pub download: DownloadType,
    #[serde(default)]
    pub file_pattern: bool,
    #[serde(default)]
    pub file_preference: FilePreference,
    #[serde(default)]
    pub file_check: Option<FileCheck>,

    // ── Server overrides ──
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub server_file: Option<String>,
    #[serde(default, rename = "serverType")]
    pub server_kind: Option<ModKind>,
    #[serde(default)]
    pub server_download: Option<DownloadType>,
    #[serde(default, rename = "serverMD5")]
    pub server_md5: Option<String>,
    #[serde(default)]
    pub server_optional: Option<bool>,

    // ── Applicability & selection ──
    #[serde(default = "yes")]
    pub client: bool,
    #[serde(default = "yes")]
    pub server: bool,
    #[serde(default)]
    pub optional: bool,
    /// Selected by default when optional.
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub library: bool,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, rename = "depends")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub linked: Option<String>,

    // ── Placement ──
    #[serde(default)]
    pub extract_to: Option<ExtractTo>,
    #[serde(default)]
    pub extract_exclude: Vec<String>,
    #[serde(default)]
    pub decomp_file: Option<String>,
    #[serde(default)]
    pub decomp_type: Option<DecompType>,
    /// For `rename`: the installed mod whose file is renamed to `file`.
    #[serde(default)]
    pub rename_from: Option<String>,
}

impl ModRef {
    pub fn applies_to(&self, side: Side) -> bool {
        match side {
            Side::Client => self.client,
            Side::Server => self.server,
        }
    }

    pub fn is_optional_for(&self, side: Side) -> bool {
        match side {
            Side::Client => self.optional,
            Side::Server => self.server_optional.unwrap_or(self.optional),
        }
    }

    pub fn kind_for(&self, side: Side) -> ModKind {
        match side {
            Side::Server => self.server_kind.unwrap_or(self.kind),
            Side::Client => self.kind,
        }
    }

    /// File name as saved, with `file_prefix` applied.
    pub fn file_name(&self, side: Side) -> String {
        let raw = match side {
            Side::Server => self.server_file.as_deref().unwrap_or(&self.file),
            Side::Client => &self.file,
        };
        match &self.file_prefix {
            Some(prefix) => format!("{prefix}{raw}"),
            None => raw.to_string(),
        }
    }

    pub fn url_for(&self, side: Side) -> Option<&str> {
        match side {
            Side::Server => self.server_url.as_deref().or(self.url.as_deref()),
            Side::Client => self.url.as_deref(),
        }
    }

    pub fn download_for(&self, side: Side) -> DownloadType {
        match side {
            Side::Server => self.server_download.unwrap_or(self.download),
            Side::Client => self.download,
        }
    }

    pub fn expected_hash(&self, side: Side) -> Option<ExpectedHash> {
        if let (Side::Server, Some(md5)) = (side, self.server_md5.as_deref()) {
            return Some(ExpectedHash::md5(md5));
        }
        if let Some(sha1) = self.sha1.as_deref().filter(|s| !s.is_empty()) {
            return Some(ExpectedHash::sha1(sha1));
        }
        self.md5
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(ExpectedHash::md5)
    }

    /// Name reduced to ASCII letters and digits, for scratch directories.
    pub fn safe_name(&self) -> String {
        self.name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
}

// ─── Actions ───

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionKind {
    #[serde(rename = "createZip")]
    BuildArchive,
    #[serde(rename = "rename")]
    Rename,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Mods,
    Coremods,
    Jar,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionAfter {
    Delete,
    #[default]
    Nothing,
}

/// A post-install transformation over already-placed mods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionRef {
    #[serde(rename = "mod")]
    pub source_mods: Vec<String>,
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(default, rename = "type")]
    pub archive_kind: Option<ArchiveKind>,
    #[serde(default)]
    pub after: ActionAfter,
    pub save_as: String,
    #[serde(default)]
    pub client: bool,
    #[serde(default)]
    pub server: bool,
}

impl ActionRef {
    pub fn applies_to(&self, side: Side) -> bool {
        match side {
            Side::Client => self.client,
            Side::Server => self.server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_json() -> serde_json::Value {
        serde_json::json!({
            "pack": "Test Pack",
            "version": "1.0.0",
            "minecraft": "1.5.2",
            "loader": {"type": "forge", "version": "7.8.1.738"},
            "mods": [
                {"name": "Forge", "type": "forge", "file": "forge.zip", "url": "https://x/forge.zip",
                 "md5": "abc", "serverType": "mcpc", "serverFile": "mcpc.jar", "serverMD5": "def"},
                {"name": "Lib", "type": "depandency", "file": "lib.jar", "client": false},
                {"name": "Optifine", "type": "jar", "file": "^OptiFine.*\\.zip$", "filePattern": true,
                 "download": "browser", "filePreference": "last", "fileCheck": "before", "optional": true}
            ],
            "actions": [
                {"mod": ["A", "B"], "action": "createZip", "type": "coremods", "after": "delete",
                 "saveAs": "AB.zip", "client": true}
            ]
        })
    }

    #[test]
    fn parses_pack_version() {
        let version: PackVersion = serde_json::from_value(version_json()).unwrap();
        assert!(version.uses_coremods());
        assert_eq!(version.mods.len(), 3);
        assert_eq!(version.mods[1].kind, ModKind::Dependency);
        assert!(!version.mods[1].client);
        assert!(version.mods[1].server);
        assert_eq!(version.mods[2].file_preference, FilePreference::Last);
        assert_eq!(version.actions[0].kind, ActionKind::BuildArchive);
        assert_eq!(version.actions[0].after, ActionAfter::Delete);
        assert!(!version.actions[0].server);
    }

    #[test]
    fn server_overrides_apply_on_server_only() {
        let version: PackVersion = serde_json::from_value(version_json()).unwrap();
        let forge = version.mod_by_name("Forge").unwrap();
        assert_eq!(forge.kind_for(Side::Client), ModKind::Forge);
        assert_eq!(forge.kind_for(Side::Server), ModKind::Mcpc);
        assert_eq!(forge.file_name(Side::Server), "mcpc.jar");
        assert_eq!(forge.expected_hash(Side::Server), Some(ExpectedHash::md5("def")));
        assert_eq!(forge.expected_hash(Side::Client), Some(ExpectedHash::md5("abc")));
    }

    #[test]
    fn coremods_cutoff_is_one_six() {
        let mut version: PackVersion = serde_json::from_value(version_json()).unwrap();
        version.minecraft = "1.6.4".into();
        assert!(!version.uses_coremods());
        version.minecraft = "1.12.2".into();
        assert!(!version.uses_coremods());
        version.uses_coremods = Some(true);
        assert!(version.uses_coremods());
    }

    #[test]
    fn forge_installer_identifier() {
        let version: PackVersion = serde_json::from_value(version_json()).unwrap();
        assert_eq!(
            version.loader.unwrap().installer_identifier("1.5.2"),
            "net.minecraftforge:forge:1.5.2-7.8.1.738:installer"
        );
    }

    #[test]
    fn safe_name_strips_punctuation() {
        let version: PackVersion = serde_json::from_value(version_json()).unwrap();
        let mut m = version.mods[0].clone();
        m.name = "Mo' Creatures (1.2)".into();
        assert_eq!(m.safe_name(), "MoCreatures12");
    }
}
