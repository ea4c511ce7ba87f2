use std::path::Path;

use tracing::info;

use crate::core::archive;
use crate::core::error::{EngineError, EngineResult};
use crate::core::manifest::{ModKind, ModRef};
use crate::core::session::InstallSession;

const TEXTURE_PACK: &str = "TexturePack.zip";
const RESOURCE_PACK: &str = "ResourcePack.zip";

/// Servers merge jar mods into the vanilla server jar: unpack it into the
/// staging directory before placement. Returns whether staging happened.
pub fn stage_server_jar(session: &InstallSession, mods: &[ModRef]) -> EngineResult<bool> {
    session.ensure_active()?;
    let has_jar_mods = mods
        .iter()
        .any(|m| m.kind_for(session.side) == ModKind::Jar);
    if !session.side.is_server() || !has_jar_mods {
        return Ok(false);
    }

    let game_jar = session.layout.game_jar_path();
    if !game_jar.is_file() {
        return Err(EngineError::Install {
            name: "server jar".to_string(),
            reason: format!("{game_jar:?} is missing; jar mods cannot be merged"),
        });
    }

    let staging = session.layout.temp_jar_dir();
    archive::reset_dir(&staging)?;
    archive::unzip(&game_jar, &staging, &[])?;
    Ok(true)
}

/// Re-pack everything staged during placement: the server jar and the
/// texture/resource pack collectors.
pub fn finalize(session: &InstallSession, server_jar_staged: bool) -> EngineResult<()> {
    session.ensure_active()?;
    let layout = &session.layout;

    if server_jar_staged {
        info!("Repacking server jar with jar mods");
        archive::zip_dir(&layout.temp_jar_dir(), &layout.game_jar_path())?;
    }

    if has_files(&layout.temp_texturepacks_dir())? {
        info!("Zipping texture pack files");
        archive::zip_dir(
            &layout.temp_texturepacks_dir(),
            &layout.texturepacks_dir().join(TEXTURE_PACK),
        )?;
    }

    if has_files(&layout.temp_resourcepacks_dir())? {
        info!("Zipping resource pack files");
        archive::zip_dir(
            &layout.temp_resourcepacks_dir(),
            &layout.resourcepacks_dir().join(RESOURCE_PACK),
        )?;
    }

    Ok(())
}

fn has_files(dir: &Path) -> EngineResult<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(EngineError::io(dir)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::test_support::{write_zip, zip_names};
    use crate::core::mods::ModInstallStrategyRegistry;
    use crate::core::session::test_support::session_in;
    use crate::core::session::Side;

    fn mod_of(name: &str, kind: &str, file: &str) -> ModRef {
        serde_json::from_value(serde_json::json!({"name": name, "type": kind, "file": file})).unwrap()
    }

    #[test]
    fn texture_pack_extracts_are_merged_into_one_zip() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let registry = ModInstallStrategyRegistry::new();

        let a = dir.path().join("cache/a.zip");
        let b = dir.path().join("cache/b.zip");
        write_zip(&a, &[("textures/a.png", b"a")]);
        write_zip(&b, &[("textures/b.png", b"b")]);
        registry
            .install(&mod_of("A", "texturepackextract", "a.zip"), Some(&a), &session)
            .unwrap();
        registry
            .install(&mod_of("B", "texturepackextract", "b.zip"), Some(&b), &session)
            .unwrap();

        finalize(&session, false).unwrap();
        let pack = session.layout.texturepacks_dir().join(TEXTURE_PACK);
        assert_eq!(zip_names(&pack), vec!["textures/a.png", "textures/b.png"]);
        assert!(!session.layout.resourcepacks_dir().join(RESOURCE_PACK).exists());
    }

    #[test]
    fn server_jar_mods_are_merged_into_game_jar() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Server);
        let game_jar = session.layout.game_jar_path();
        write_zip(&game_jar, &[("net/Server.class", b"s"), ("a.class", b"old")]);

        let mods = vec![mod_of("Patch", "jar", "patch.zip")];
        assert!(stage_server_jar(&session, &mods).unwrap());

        let patch = dir.path().join("cache/patch.zip");
        write_zip(&patch, &[("a.class", b"new")]);
        ModInstallStrategyRegistry::new()
            .install(&mods[0], Some(&patch), &session)
            .unwrap();
        finalize(&session, true).unwrap();

        assert_eq!(zip_names(&game_jar), vec!["a.class", "net/Server.class"]);
        assert_eq!(
            crate::core::archive::read_entry(&game_jar, "a.class").unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[test]
    fn client_never_stages_server_jar() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let mods = vec![mod_of("Patch", "jar", "patch.zip")];
        assert!(!stage_server_jar(&session, &mods).unwrap());
    }

    #[test]
    fn cancelled_session_neither_stages_nor_repacks() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Server);
        let game_jar = session.layout.game_jar_path();
        write_zip(&game_jar, &[("net/Server.class", b"s")]);
        session.cancel("user");

        let mods = vec![mod_of("Patch", "jar", "patch.zip")];
        assert!(matches!(stage_server_jar(&session, &mods), Err(EngineError::Cancelled)));
        assert!(!session.layout.temp_jar_dir().exists());
        assert!(matches!(finalize(&session, true), Err(EngineError::Cancelled)));
        assert_eq!(zip_names(&game_jar), vec!["net/Server.class"]);
    }
}
