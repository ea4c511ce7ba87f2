use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::strategy::{
    CollectInto, CopyTo, Decomp, Dest, Extract, JarMod, Millenaire, ModContext, ModInstallStrategy,
    RenameInstalled, ServerRootOnly,
};
use crate::core::error::{EngineError, EngineResult};
use crate::core::manifest::{ModKind, ModRef};
use crate::core::session::InstallSession;

/// Kind → strategy table. Adding a kind means adding one row here.
fn default_table() -> Vec<(ModKind, Box<dyn ModInstallStrategy>)> {
    vec![
        (ModKind::Jar, Box::new(JarMod { server_copy: false })),
        (ModKind::Dependency, Box::new(CopyTo(Dest::Dependencies))),
        (ModKind::Forge, Box::new(JarMod { server_copy: true })),
        (ModKind::Mcpc, Box::new(ServerRootOnly)),
        (ModKind::Mods, Box::new(CopyTo(Dest::Mods))),
        (ModKind::Plugins, Box::new(CopyTo(Dest::Plugins))),
        (ModKind::Ic2lib, Box::new(CopyTo(Dest::Ic2))),
        (ModKind::Denlib, Box::new(CopyTo(Dest::Denlib))),
        (ModKind::Flan, Box::new(CopyTo(Dest::Flan))),
        (ModKind::Coremods, Box::new(CopyTo(Dest::Coremods))),
        (ModKind::Extract, Box::new(Extract)),
        (ModKind::Decomp, Box::new(Decomp)),
        (ModKind::Millenaire, Box::new(Millenaire)),
        (ModKind::Texturepack, Box::new(CopyTo(Dest::Texturepacks))),
        (ModKind::Resourcepack, Box::new(CopyTo(Dest::Resourcepacks))),
        (
            ModKind::Texturepackextract,
            Box::new(CollectInto {
                staging: |s| s.layout.temp_texturepacks_dir(),
            }),
        ),
        (
            ModKind::Resourcepackextract,
            Box::new(CollectInto {
                staging: |s| s.layout.temp_resourcepacks_dir(),
            }),
        ),
        (ModKind::Shaderpack, Box::new(CopyTo(Dest::Shaderpacks))),
        (ModKind::Rename, Box::new(RenameInstalled)),
    ]
}

/// Dispatches mod placement by kind.
pub struct ModInstallStrategyRegistry {
    strategies: HashMap<ModKind, Box<dyn ModInstallStrategy>>,
}

impl Default for ModInstallStrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModInstallStrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: default_table().into_iter().collect(),
        }
    }

    /// Replace or add the strategy for a kind.
    pub fn register(&mut self, kind: ModKind, strategy: Box<dyn ModInstallStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    /// Kinds that work on already-installed files and fetch nothing.
    pub fn needs_file(kind: ModKind) -> bool {
        kind != ModKind::Rename
    }

    pub fn install_dir(&self, mod_ref: &ModRef, session: &InstallSession) -> Option<PathBuf> {
        let strategy = self.strategies.get(&mod_ref.kind_for(session.side))?;
        strategy.install_dir(&ModContext {
            session,
            mod_ref,
            source: None,
        })
    }

    /// Place one mod. Any failure cancels the session.
    pub fn install(
        &self,
        mod_ref: &ModRef,
        source: Option<&Path>,
        session: &InstallSession,
    ) -> EngineResult<Option<PathBuf>> {
        session.ensure_active()?;

        let kind = mod_ref.kind_for(session.side);
        let result = match self.strategies.get(&kind) {
            Some(strategy) => {
                debug!("Installing {} as {:?}", mod_ref.name, kind);
                strategy
                    .install(&ModContext {
                        session,
                        mod_ref,
                        source,
                    })
                    .map_err(|e| match e {
                        EngineError::Install { .. } | EngineError::Cancelled => e,
                        other => EngineError::Install {
                            name: mod_ref.name.clone(),
                            reason: other.to_string(),
                        },
                    })
            }
            None => Err(EngineError::Install {
                name: mod_ref.name.clone(),
                reason: format!("no install strategy for {kind:?}"),
            }),
        };

        let placed = session.guard(result)?;
        if let Some(path) = &placed {
            session.record_installed(&mod_ref.name, path.clone());
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::test_support::write_zip;
    use crate::core::manifest::{DecompType, ExtractTo};
    use crate::core::session::test_support::session_in;
    use crate::core::session::Side;

    fn mod_of(name: &str, kind: ModKind, file: &str) -> ModRef {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "type": kind,
            "file": file,
        }))
        .unwrap()
    }

    fn cached(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join("cache").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn every_kind_has_a_strategy() {
        let registry = ModInstallStrategyRegistry::new();
        for (kind, _) in default_table() {
            assert!(registry.strategies.contains_key(&kind));
        }
        assert_eq!(registry.strategies.len(), 19);
    }

    #[test]
    fn registered_strategy_replaces_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let mut registry = ModInstallStrategyRegistry::new();
        registry.register(ModKind::Plugins, Box::new(CopyTo(Dest::Mods)));

        let plugin = mod_of("Essentials", ModKind::Plugins, "essentials.jar");
        let source = cached(dir.path(), "essentials.jar", b"jar");
        registry.install(&plugin, Some(&source), &session).unwrap();

        assert!(session.layout.mods_dir().join("essentials.jar").is_file());
        assert!(!session.layout.plugins_dir().exists());
    }

    #[test]
    fn jar_mod_replay_appends_once() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let registry = ModInstallStrategyRegistry::new();
        let jar = mod_of("Optifine", ModKind::Jar, "optifine.zip");
        let source = cached(dir.path(), "optifine.zip", b"zip");

        registry.install(&jar, Some(&source), &session).unwrap();
        registry.install(&jar, Some(&source), &session).unwrap();

        assert_eq!(session.jar_order(), vec!["optifine.zip"]);
        assert!(session.layout.jarmods_dir().join("optifine.zip").is_file());
        assert_eq!(
            session.installed_file("Optifine"),
            Some(session.layout.jarmods_dir().join("optifine.zip"))
        );
    }

    #[test]
    fn coremods_fall_back_to_mods_on_modern_versions() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let registry = ModInstallStrategyRegistry::new();
        let core = mod_of("CodeChickenCore", ModKind::Coremods, "ccc.jar");

        assert_eq!(
            registry.install_dir(&core, &session),
            Some(session.layout.mods_dir())
        );
        let source = cached(dir.path(), "ccc.jar", b"jar");
        let placed = registry.install(&core, Some(&source), &session).unwrap().unwrap();
        assert_eq!(placed, session.layout.mods_dir().join("ccc.jar"));
    }

    #[test]
    fn dependency_goes_to_version_folder() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let dep = mod_of("Lib", ModKind::Dependency, "lib.jar");
        let source = cached(dir.path(), "lib.jar", b"jar");
        ModInstallStrategyRegistry::new()
            .install(&dep, Some(&source), &session)
            .unwrap();
        assert!(session.layout.dependencies_dir().join("lib.jar").is_file());
    }

    #[test]
    fn forge_on_server_lands_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Server);
        let forge = mod_of("Forge", ModKind::Forge, "forge-universal.jar");
        let source = cached(dir.path(), "forge-universal.jar", b"jar");
        let placed = ModInstallStrategyRegistry::new()
            .install(&forge, Some(&source), &session)
            .unwrap();
        assert_eq!(placed, Some(session.root().join("forge-universal.jar")));
        assert!(session.jar_order().is_empty());
    }

    #[test]
    fn extract_honours_exclude() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let mut m = mod_of("Configs", ModKind::Extract, "configs.zip");
        m.extract_to = Some(ExtractTo::Root);
        m.extract_exclude = vec!["__MACOSX/".into()];
        let source = dir.path().join("cache/configs.zip");
        write_zip(&source, &[("config/a.cfg", b"a"), ("__MACOSX/junk", b"j")]);

        ModInstallStrategyRegistry::new()
            .install(&m, Some(&source), &session)
            .unwrap();
        assert!(session.root().join("config/a.cfg").is_file());
        assert!(!session.root().join("__MACOSX").exists());
    }

    #[test]
    fn decomp_relocates_member_and_fails_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let registry = ModInstallStrategyRegistry::new();
        let source = dir.path().join("cache/bundle.zip");
        write_zip(
            &source,
            &[("readme.txt", b"r"), ("dist/Actual.jar", b"jar")],
        );

        let mut m = mod_of("Bundle", ModKind::Decomp, "bundle.zip");
        m.decomp_file = Some("dist/Actual.jar".into());
        m.decomp_type = Some(DecompType::Mods);
        let placed = registry.install(&m, Some(&source), &session).unwrap();
        assert_eq!(placed, Some(session.layout.mods_dir().join("Actual.jar")));
        assert!(!session.layout.mods_dir().join("readme.txt").exists());

        m.decomp_file = Some("dist/Missing.jar".into());
        let err = registry.install(&m, Some(&source), &session).unwrap_err();
        assert!(matches!(err, EngineError::Install { .. }));
        assert!(session.is_cancelled());
    }

    #[test]
    fn decomp_directory_into_jar_is_repacked() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let source = dir.path().join("cache/patch.zip");
        write_zip(&source, &[("classes/a.class", b"a"), ("classes/b.class", b"b")]);

        let mut m = mod_of("Patch Mod", ModKind::Decomp, "patch.zip");
        m.decomp_file = Some("classes".into());
        m.decomp_type = Some(DecompType::Jar);
        ModInstallStrategyRegistry::new()
            .install(&m, Some(&source), &session)
            .unwrap();

        assert!(session.layout.jarmods_dir().join("PatchMod.zip").is_file());
        assert_eq!(session.jar_order(), vec!["PatchMod.zip"]);
    }

    #[test]
    fn millenaire_copies_second_level_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let source = dir.path().join("cache/millenaire.zip");
        write_zip(
            &source,
            &[
                ("Millenaire 5.0/millenaire/data.txt", b"d"),
                ("Millenaire 5.0/org/Mill.class", b"c"),
                ("Millenaire 5.0/readme.txt", b"r"),
            ],
        );

        let m = mod_of("Millenaire", ModKind::Millenaire, "millenaire.zip");
        ModInstallStrategyRegistry::new()
            .install(&m, Some(&source), &session)
            .unwrap();
        let mods = session.layout.mods_dir();
        assert!(mods.join("millenaire/data.txt").is_file());
        assert!(mods.join("org/Mill.class").is_file());
        assert!(!mods.join("readme.txt").exists());
    }

    #[test]
    fn rename_moves_installed_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let registry = ModInstallStrategyRegistry::new();
        let source = cached(dir.path(), "jei-raw.jar", b"jar");
        registry
            .install(&mod_of("JEI", ModKind::Mods, "jei-raw.jar"), Some(&source), &session)
            .unwrap();

        let mut rename = mod_of("JEI rename", ModKind::Rename, "jei.jar");
        rename.rename_from = Some("JEI".into());
        assert!(!ModInstallStrategyRegistry::needs_file(rename.kind));
        registry.install(&rename, None, &session).unwrap();

        let mods = session.layout.mods_dir();
        assert!(mods.join("jei.jar").is_file());
        assert!(!mods.join("jei-raw.jar").exists());
        assert_eq!(session.installed_file("JEI"), Some(mods.join("jei.jar")));
    }

    #[test]
    fn cancelled_session_places_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        session.cancel("test");
        let source = cached(dir.path(), "a.jar", b"jar");
        let result = ModInstallStrategyRegistry::new().install(
            &mod_of("A", ModKind::Mods, "a.jar"),
            Some(&source),
            &session,
        );
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(!session.layout.mods_dir().join("a.jar").exists());
    }
}
