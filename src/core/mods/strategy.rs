use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::archive;
use crate::core::error::{EngineError, EngineResult};
use crate::core::manifest::{DecompType, ExtractTo, ModRef};
use crate::core::session::InstallSession;

/// Everything a strategy needs to place one mod.
pub struct ModContext<'a> {
    pub session: &'a InstallSession,
    pub mod_ref: &'a ModRef,
    /// The fetched file in the download cache; `None` for kinds that
    /// download nothing.
    pub source: Option<&'a Path>,
}

impl<'a> ModContext<'a> {
    pub fn source(&self) -> EngineResult<&'a Path> {
        self.source
            .ok_or_else(|| self.fail("no downloaded file to install"))
    }

    pub fn file_name(&self) -> String {
        self.source
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.mod_ref.file_name(self.session.side))
    }

    fn fail(&self, reason: impl Into<String>) -> EngineError {
        EngineError::Install {
            name: self.mod_ref.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Per-kind placement behaviour.
pub trait ModInstallStrategy: Send + Sync {
    /// Directory the mod's file ends up in, when it has a single one.
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf>;

    /// Place the mod. Returns the installed file when there is one.
    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>>;
}

/// Named instance directories a strategy can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dest {
    Root,
    Mods,
    /// `coremods/` when the game version uses it, `mods/` otherwise.
    Coremods,
    Jarmods,
    Dependencies,
    Plugins,
    Ic2,
    Denlib,
    Flan,
    Texturepacks,
    Resourcepacks,
    Shaderpacks,
}

impl Dest {
    pub fn resolve(self, session: &InstallSession) -> PathBuf {
        let layout = &session.layout;
        match self {
            Dest::Root => layout.root().to_path_buf(),
            Dest::Mods => layout.mods_dir(),
            Dest::Coremods if session.uses_coremods => layout.coremods_dir(),
            Dest::Coremods => layout.mods_dir(),
            Dest::Jarmods => layout.jarmods_dir(),
            Dest::Dependencies => layout.dependencies_dir(),
            Dest::Plugins => layout.plugins_dir(),
            Dest::Ic2 => layout.ic2_dir(),
            Dest::Denlib => layout.denlib_dir(),
            Dest::Flan => layout.flan_dir(),
            Dest::Texturepacks => layout.texturepacks_dir(),
            Dest::Resourcepacks => layout.resourcepacks_dir(),
            Dest::Shaderpacks => layout.shaderpacks_dir(),
        }
    }
}

impl From<ExtractTo> for Dest {
    fn from(value: ExtractTo) -> Self {
        match value {
            ExtractTo::Mods => Dest::Mods,
            ExtractTo::Coremods => Dest::Coremods,
            ExtractTo::Root => Dest::Root,
        }
    }
}

/// Copy `file` into `dir` under `name`, creating `dir` on first use.
pub(crate) fn copy_into(file: &Path, dir: &Path, name: &str) -> EngineResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(EngineError::io(dir))?;
    let target = dir.join(name);
    std::fs::copy(file, &target).map_err(EngineError::io(&target))?;
    Ok(target)
}

// ─── Copy ───

/// Place the file verbatim.
pub struct CopyTo(pub Dest);

impl ModInstallStrategy for CopyTo {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        Some(self.0.resolve(ctx.session))
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let dir = self.0.resolve(ctx.session);
        copy_into(ctx.source()?, &dir, &ctx.file_name()).map(Some)
    }
}

/// Client: into `jarmods/` and the jar load order. Server: merged into the
/// staged server jar, or copied to the root when `server_copy` is set.
pub struct JarMod {
    pub server_copy: bool,
}

impl ModInstallStrategy for JarMod {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        match (ctx.session.side.is_server(), self.server_copy) {
            (true, true) => Some(ctx.session.root().to_path_buf()),
            (true, false) => None,
            (false, _) => Some(ctx.session.layout.jarmods_dir()),
        }
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let session = ctx.session;
        if session.side.is_server() {
            if self.server_copy {
                return copy_into(ctx.source()?, session.root(), &ctx.file_name()).map(Some);
            }
            archive::unzip(ctx.source()?, &session.layout.temp_jar_dir(), &[])?;
            return Ok(None);
        }

        let name = ctx.file_name();
        let target = copy_into(ctx.source()?, &session.layout.jarmods_dir(), &name)?;
        session.add_to_jar_order(&name);
        Ok(Some(target))
    }
}

/// Only meaningful for servers; a no-op on clients.
pub struct ServerRootOnly;

impl ModInstallStrategy for ServerRootOnly {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        ctx.session
            .side
            .is_server()
            .then(|| ctx.session.root().to_path_buf())
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        if !ctx.session.side.is_server() {
            debug!("{} only applies to servers", ctx.mod_ref.name);
            return Ok(None);
        }
        copy_into(ctx.source()?, ctx.session.root(), &ctx.file_name()).map(Some)
    }
}

// ─── Extract ───

/// Unzip into the directory named by `extract_to`.
pub struct Extract;

impl ModInstallStrategy for Extract {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        ctx.mod_ref
            .extract_to
            .map(|to| Dest::from(to).resolve(ctx.session))
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let dir = self
            .install_dir(ctx)
            .ok_or_else(|| ctx.fail("extract mod has no extractTo"))?;
        archive::unzip(ctx.source()?, &dir, &ctx.mod_ref.extract_exclude)?;
        Ok(None)
    }
}

/// Unzip to scratch, then relocate one named sub-path.
pub struct Decomp;

impl ModInstallStrategy for Decomp {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        let dest = match ctx.mod_ref.decomp_type? {
            DecompType::Mods => Dest::Mods,
            DecompType::Coremods => Dest::Coremods,
            DecompType::Jar => Dest::Jarmods,
            DecompType::Root => Dest::Root,
        };
        Some(dest.resolve(ctx.session))
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let member = ctx
            .mod_ref
            .decomp_file
            .as_deref()
            .ok_or_else(|| ctx.fail("decomp mod has no decompFile"))?;
        let decomp_type = ctx
            .mod_ref
            .decomp_type
            .ok_or_else(|| ctx.fail("decomp mod has no decompType"))?;
        let dir = self
            .install_dir(ctx)
            .ok_or_else(|| ctx.fail("decomp mod has no destination"))?;

        let scratch = ctx.session.layout.temp_decomp_dir(&ctx.mod_ref.safe_name());
        archive::reset_dir(&scratch)?;
        archive::unzip(ctx.source()?, &scratch, &[])?;

        let extracted = scratch.join(member);
        if !extracted.exists() {
            return Err(ctx.fail(format!("archive has no member {member:?}")));
        }

        let session = ctx.session;
        if extracted.is_file() {
            let name = extracted
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| member.to_string());
            let target = copy_into(&extracted, &dir, &name)?;
            if decomp_type == DecompType::Jar {
                session.add_to_jar_order(&name);
            }
            return Ok(Some(target));
        }

        if decomp_type == DecompType::Jar {
            let name = format!("{}.zip", ctx.mod_ref.safe_name());
            let target = dir.join(&name);
            archive::zip_dir(&extracted, &target)?;
            session.add_to_jar_order(&name);
            return Ok(Some(target));
        }

        archive::copy_dir_recursive(&extracted, &dir)?;
        Ok(None)
    }
}

/// Copy every second-level directory of the archive into `mods/`.
pub struct Millenaire;

impl ModInstallStrategy for Millenaire {
    fn install_dir(&self, _ctx: &ModContext<'_>) -> Option<PathBuf> {
        None
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let scratch = ctx.session.layout.temp_decomp_dir(&ctx.mod_ref.safe_name());
        archive::reset_dir(&scratch)?;
        archive::unzip(ctx.source()?, &scratch, &[])?;

        let mods_dir = ctx.session.layout.mods_dir();
        for top in read_dirs(&scratch)? {
            for inner in read_dirs(&top)? {
                let name = inner
                    .file_name()
                    .map(|n| n.to_os_string())
                    .ok_or_else(|| ctx.fail("unnamed directory in archive"))?;
                archive::copy_dir_recursive(&inner, &mods_dir.join(name))?;
            }
        }

        std::fs::remove_dir_all(&scratch).map_err(EngineError::io(&scratch))?;
        Ok(None)
    }
}

fn read_dirs(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(EngineError::io(dir))? {
        let path = entry.map_err(EngineError::io(dir))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Unzip into a staging directory that is re-packed once after all mods.
pub struct CollectInto {
    pub staging: fn(&InstallSession) -> PathBuf,
}

impl ModInstallStrategy for CollectInto {
    fn install_dir(&self, _ctx: &ModContext<'_>) -> Option<PathBuf> {
        None
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        archive::unzip(ctx.source()?, &(self.staging)(ctx.session), &[])?;
        Ok(None)
    }
}

// ─── Rename ───

/// Rename another, already-installed mod's file to this mod's `file`.
pub struct RenameInstalled;

impl ModInstallStrategy for RenameInstalled {
    fn install_dir(&self, ctx: &ModContext<'_>) -> Option<PathBuf> {
        let from = ctx.mod_ref.rename_from.as_deref()?;
        ctx.session
            .installed_file(from)
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }

    fn install(&self, ctx: &ModContext<'_>) -> EngineResult<Option<PathBuf>> {
        let from_mod = ctx
            .mod_ref
            .rename_from
            .as_deref()
            .ok_or_else(|| ctx.fail("rename mod has no renameFrom"))?;
        let from = ctx
            .session
            .installed_file(from_mod)
            .ok_or_else(|| ctx.fail(format!("{from_mod} has not been installed")))?;
        let dir = from
            .parent()
            .ok_or_else(|| ctx.fail(format!("{from:?} has no parent")))?;
        let to = dir.join(ctx.mod_ref.file_name(ctx.session.side));

        std::fs::rename(&from, &to).map_err(EngineError::io(&to))?;
        ctx.session.record_installed(from_mod, to.clone());
        Ok(Some(to))
    }
}
