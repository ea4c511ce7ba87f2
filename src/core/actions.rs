// ─── Post-install Actions ───
// Declarative steps over mods that are already placed: merge several into one
// archive, or rename a single one. Runs once, after every mod is installed.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::archive;
use crate::core::error::{EngineError, EngineResult};
use crate::core::manifest::{ActionAfter, ActionKind, ActionRef, ArchiveKind};
use crate::core::session::InstallSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub archives_built: usize,
    pub renamed: usize,
    /// Actions whose source count matched neither kind.
    pub skipped: usize,
    pub files_deleted: usize,
}

pub struct ActionPipeline<'a> {
    session: &'a InstallSession,
}

impl<'a> ActionPipeline<'a> {
    pub fn new(session: &'a InstallSession) -> Self {
        Self { session }
    }

    /// Execute `actions` in order. Source mods are looked up among the
    /// files this session installed; absent ones are not counted.
    pub fn execute(&self, actions: &[ActionRef]) -> EngineResult<ActionReport> {
        let mut report = ActionReport::default();

        for action in actions {
            self.session.ensure_active()?;
            if !action.applies_to(self.session.side) {
                continue;
            }

            let sources: Vec<PathBuf> = action
                .source_mods
                .iter()
                .filter_map(|name| self.session.installed_file(name))
                .collect();

            let result = match action.kind {
                ActionKind::BuildArchive if sources.len() >= 2 => {
                    self.build_archive(action, &sources).map(|_| report.archives_built += 1)
                }
                ActionKind::Rename if sources.len() == 1 => {
                    self.rename(action, &sources[0]).map(|_| report.renamed += 1)
                }
                _ => {
                    debug!(
                        "Skipping {:?} -> {}: {} installed source mod(s)",
                        action.kind,
                        action.save_as,
                        sources.len()
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            self.session.guard(result)?;

            if action.after == ActionAfter::Delete {
                for source in &sources {
                    match std::fs::remove_file(source) {
                        Ok(()) => report.files_deleted += 1,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return self.session.guard(Err(EngineError::io(source)(e))),
                    }
                }
            }
        }

        Ok(report)
    }

    fn build_archive(&self, action: &ActionRef, sources: &[PathBuf]) -> EngineResult<()> {
        let layout = &self.session.layout;
        let scratch = layout.temp_actions_dir();
        archive::reset_dir(&scratch)?;

        for source in sources {
            archive::unzip(source, &scratch, &[])?;
        }

        let archive_kind = action.archive_kind.unwrap_or(ArchiveKind::Mods);
        let dir = match archive_kind {
            ArchiveKind::Mods => layout.mods_dir(),
            ArchiveKind::Coremods if self.session.uses_coremods => layout.coremods_dir(),
            ArchiveKind::Coremods => layout.mods_dir(),
            ArchiveKind::Jar => layout.jarmods_dir(),
        };

        let target = dir.join(&action.save_as);
        let files = archive::zip_dir(&scratch, &target)?;
        info!(
            "Built {} from {} mods ({} files)",
            action.save_as,
            sources.len(),
            files
        );

        if archive_kind == ArchiveKind::Jar {
            self.session.add_to_jar_order(&action.save_as);
        }
        Ok(())
    }

    fn rename(&self, action: &ActionRef, source: &Path) -> EngineResult<()> {
        let dir = source
            .parent()
            .ok_or_else(|| EngineError::Other(format!("{source:?} has no parent")))?;
        let target = dir.join(&action.save_as);
        std::fs::rename(source, &target).map_err(EngineError::io(&target))?;
        info!("Renamed {:?} to {}", source, action.save_as);
        Ok(())
    }
}
