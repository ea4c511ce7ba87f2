use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{EngineError, EngineResult};
use crate::core::library::LibraryRef;
use crate::core::session::Side;

/// Per-side value of one `data` entry in a modern install profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataEntry {
    pub client: String,
    pub server: String,
}

impl DataEntry {
    pub fn for_side(&self, side: Side) -> &str {
        match side {
            Side::Client => &self.client,
            Side::Server => &self.server,
        }
    }
}

/// One external processing step from the install profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSpec {
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Restricts the processor to `client` and/or `server`.
    #[serde(default)]
    pub sides: Option<Vec<String>>,
    /// Output path template → expected SHA-1 template.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub main_class_hint: Option<String>,
}

impl ProcessorSpec {
    pub fn runs_on(&self, side: Side) -> bool {
        self.sides
            .as_ref()
            .map_or(true, |sides| sides.iter().any(|s| s == side.as_str()))
    }
}

/// Library shipped inside a legacy installer rather than on a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledLibrary {
    pub identifier: String,
    /// Path of the file inside the extracted installer.
    pub file_path: String,
}

/// Both profile shapes normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderInstallProfile {
    pub version: Option<String>,
    pub bundled: Option<BundledLibrary>,
    pub data: BTreeMap<String, DataEntry>,
    pub processors: Vec<ProcessorSpec>,
    /// Libraries the installer itself needs (processor jars and friends).
    pub install_libraries: Vec<LibraryRef>,
    /// Libraries the loader needs at game runtime.
    pub runtime_libraries: Vec<LibraryRef>,
    pub main_class: String,
    pub game_args: Vec<String>,
    pub jvm_args: Vec<String>,
}

impl LoaderInstallProfile {
    /// Install and runtime libraries, de-duplicated by identifier, install
    /// libraries first.
    pub fn merged_libraries(&self) -> Vec<LibraryRef> {
        let mut seen = HashSet::new();
        self.install_libraries
            .iter()
            .chain(&self.runtime_libraries)
            .filter(|lib| seen.insert(lib.name.clone()))
            .cloned()
            .collect()
    }
}

// ─── Legacy shape ───

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyProfile {
    install: LegacyInstall,
    version_info: LegacyVersionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstall {
    path: String,
    file_path: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyVersionInfo {
    main_class: String,
    #[serde(default)]
    minecraft_arguments: Option<String>,
    #[serde(default)]
    libraries: Vec<LibraryRef>,
}

// ─── Modern shape ───

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModernProfile {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    data: BTreeMap<String, DataEntry>,
    #[serde(default)]
    processors: Vec<ProcessorSpec>,
    #[serde(default)]
    libraries: Vec<LibraryRef>,
}

/// `version.json` bundled next to a modern profile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionJson {
    main_class: String,
    #[serde(default)]
    libraries: Vec<LibraryRef>,
    #[serde(default)]
    arguments: Option<VersionArguments>,
    #[serde(default)]
    minecraft_arguments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionArguments {
    #[serde(default)]
    game: Vec<Value>,
    #[serde(default)]
    jvm: Vec<Value>,
}

/// Plain string arguments only; rule-guarded argument objects are launch
/// concerns and are dropped here.
fn plain_args(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn split_args(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Parse `install_profile.json`, and for the modern shape the accompanying
/// `version.json`.
pub fn parse_profile(profile: &str, version_json: Option<&str>) -> EngineResult<LoaderInstallProfile> {
    let raw: Value = serde_json::from_str(profile)
        .map_err(|e| EngineError::ProfileParse(format!("install_profile.json: {e}")))?;

    if raw.get("versionInfo").is_some() {
        let legacy: LegacyProfile = serde_json::from_value(raw)
            .map_err(|e| EngineError::ProfileParse(format!("legacy profile: {e}")))?;
        return Ok(LoaderInstallProfile {
            version: legacy.install.version,
            bundled: Some(BundledLibrary {
                identifier: legacy.install.path,
                file_path: legacy.install.file_path,
            }),
            runtime_libraries: legacy.version_info.libraries,
            main_class: legacy.version_info.main_class,
            game_args: split_args(legacy.version_info.minecraft_arguments.as_deref()),
            ..Default::default()
        });
    }

    if raw.get("processors").is_none() && raw.get("data").is_none() {
        return Err(EngineError::ProfileParse(
            "profile has neither versionInfo nor processors/data".to_string(),
        ));
    }

    let modern: ModernProfile = serde_json::from_value(raw)
        .map_err(|e| EngineError::ProfileParse(format!("modern profile: {e}")))?;
    let version_json = version_json
        .ok_or_else(|| EngineError::ProfileParse("installer has no version.json".to_string()))?;
    let version: VersionJson = serde_json::from_str(version_json)
        .map_err(|e| EngineError::ProfileParse(format!("version.json: {e}")))?;

    let arguments = version.arguments.unwrap_or_default();
    let mut game_args = plain_args(&arguments.game);
    if game_args.is_empty() {
        game_args = split_args(version.minecraft_arguments.as_deref());
    }

    Ok(LoaderInstallProfile {
        version: modern.version,
        bundled: None,
        data: modern.data,
        processors: modern.processors,
        install_libraries: modern.libraries,
        runtime_libraries: version.libraries,
        main_class: version.main_class,
        game_args,
        jvm_args: plain_args(&arguments.jvm),
    })
}
