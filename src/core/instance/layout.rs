use std::path::{Path, PathBuf};

use crate::core::session::Side;

/// Directory conventions for one instance (client) or server root.
///
/// Each instance has its own folder with:
/// - `mods/`, `coremods/`, `jarmods/`  — placed mods by kind
/// - `bin/natives/`                    — extracted native libraries
/// - `texturepacks/`, `resourcepacks/`, `shaderpacks/`
/// - `instance.json`                   — the install record
///
/// Servers keep their libraries inside the root; clients share the
/// launcher-wide library cache.
#[derive(Debug, Clone)]
pub struct InstanceLayout {
    root: PathBuf,
    shared_libraries: PathBuf,
    temp: PathBuf,
    side: Side,
    game_version: String,
}

impl InstanceLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        shared_libraries: impl Into<PathBuf>,
        temp: impl Into<PathBuf>,
        side: Side,
        game_version: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            shared_libraries: shared_libraries.into(),
            temp: temp.into(),
            side,
            game_version: game_version.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn coremods_dir(&self) -> PathBuf {
        self.root.join("coremods")
    }

    pub fn jarmods_dir(&self) -> PathBuf {
        self.root.join("jarmods")
    }

    /// Version-scoped dependency folder (`mods/<game version>`).
    pub fn dependencies_dir(&self) -> PathBuf {
        self.mods_dir().join(&self.game_version)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn ic2_dir(&self) -> PathBuf {
        self.mods_dir().join("ic2")
    }

    pub fn denlib_dir(&self) -> PathBuf {
        self.mods_dir().join("denlib")
    }

    pub fn flan_dir(&self) -> PathBuf {
        self.root.join("Flan")
    }

    pub fn texturepacks_dir(&self) -> PathBuf {
        self.root.join("texturepacks")
    }

    pub fn resourcepacks_dir(&self) -> PathBuf {
        self.root.join("resourcepacks")
    }

    pub fn shaderpacks_dir(&self) -> PathBuf {
        self.root.join("shaderpacks")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.bin_dir().join("natives")
    }

    /// Library tree processors and loader libraries are written to.
    pub fn libraries_dir(&self) -> PathBuf {
        match self.side {
            Side::Server => self.root.join("libraries"),
            Side::Client => self.shared_libraries.clone(),
        }
    }

    /// Private scratch area for this session.
    pub fn temp_dir(&self) -> &Path {
        &self.temp
    }

    pub fn temp_jar_dir(&self) -> PathBuf {
        self.temp.join("jar")
    }

    pub fn temp_actions_dir(&self) -> PathBuf {
        self.temp.join("actions")
    }

    pub fn temp_texturepacks_dir(&self) -> PathBuf {
        self.temp.join("texturepacks")
    }

    pub fn temp_resourcepacks_dir(&self) -> PathBuf {
        self.temp.join("resourcepacks")
    }

    pub fn temp_loader_dir(&self) -> PathBuf {
        self.temp.join("loader")
    }

    /// Where a decompress-and-relocate mod is unpacked before relocation.
    pub fn temp_decomp_dir(&self, safe_name: &str) -> PathBuf {
        self.temp.join("decomp").join(safe_name)
    }

    /// The vanilla game jar processors and server jar mods operate on.
    pub fn game_jar_path(&self) -> PathBuf {
        match self.side {
            Side::Server => self
                .root
                .join(format!("minecraft_server.{}.jar", self.game_version)),
            Side::Client => self.bin_dir().join("minecraft.jar"),
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join("instance.json")
    }

    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    pub fn side(&self) -> Side {
        self.side
    }
}
