use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::processor::{build_variables, run_processors, ProcessRunner, ProcessorPaths, SubprocessRunner};
use super::profile::{parse_profile, LoaderInstallProfile};
use crate::core::archive;
use crate::core::downloader::{copy_verified, DownloadEntry, Downloader};
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::{needs_download_async, ExpectedHash};
use crate::core::library::{LibraryResolver, ResolvedArtifact};
use crate::core::manifest::LoaderSpec;
use crate::core::maven::MavenArtifact;
use crate::core::session::InstallSession;

/// Where a loader install currently stands. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaderInstallState {
    Idle,
    InstallerDownloaded,
    ProfileParsed,
    LibrariesResolved,
    ProcessorsRun,
    Complete,
    Cancelled,
}

/// What the game launch needs from the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderInstallResult {
    pub main_class: String,
    pub libraries: Vec<String>,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,
    pub processors_run: usize,
}

pub struct LoaderInstaller<'a> {
    downloader: &'a Downloader,
    resolver: &'a LibraryResolver,
    runner: Arc<dyn ProcessRunner>,
    state: LoaderInstallState,
}

impl<'a> LoaderInstaller<'a> {
    pub fn new(downloader: &'a Downloader, resolver: &'a LibraryResolver) -> Self {
        Self {
            downloader,
            resolver,
            runner: Arc::new(SubprocessRunner),
            state: LoaderInstallState::Idle,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn state(&self) -> LoaderInstallState {
        self.state
    }

    /// Drive the loader install to completion. Any failure cancels the
    /// session and leaves the installer in `Cancelled`.
    pub async fn install(
        &mut self,
        spec: &LoaderSpec,
        session: &InstallSession,
    ) -> EngineResult<LoaderInstallResult> {
        let result = self.run(spec, session).await;
        match session.guard(result) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Loader install stopped in {:?}: {}", self.state, e);
                self.state = LoaderInstallState::Cancelled;
                Err(e)
            }
        }
    }

    fn advance(&mut self, session: &InstallSession, next: LoaderInstallState) -> EngineResult<()> {
        session.ensure_active()?;
        debug!("Loader install {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    async fn run(
        &mut self,
        spec: &LoaderSpec,
        session: &InstallSession,
    ) -> EngineResult<LoaderInstallResult> {
        let game_version = session.layout.game_version().to_string();
        info!("Installing {:?} {} for {}", spec.kind, spec.version, game_version);

        session.ensure_active()?;
        let installer = self.download_installer(spec, &game_version, session).await?;
        let extracted = session.layout.temp_loader_dir();
        archive::reset_dir(&extracted)?;
        archive::unzip_async(&installer, &extracted, &[]).await?;
        self.advance(session, LoaderInstallState::InstallerDownloaded)?;

        let profile = read_profile(&extracted).await?;
        self.advance(session, LoaderInstallState::ProfileParsed)?;

        let libraries = self.install_libraries(&profile, &extracted, session).await?;
        self.advance(session, LoaderInstallState::LibrariesResolved)?;

        let paths = ProcessorPaths {
            libraries_dir: session.layout.libraries_dir(),
            extracted_dir: extracted.clone(),
            installer: installer.clone(),
            game_jar: session.layout.game_jar_path(),
            root: session.root().to_path_buf(),
        };
        let vars = build_variables(&profile, session.side, &paths);
        let java = session.config.java_binary();
        let processors_run =
            run_processors(&profile, &vars, &java, self.runner.as_ref(), session).await?;
        self.advance(session, LoaderInstallState::ProcessorsRun)?;

        self.advance(session, LoaderInstallState::Complete)?;
        info!(
            "Loader installed: {} libraries, {} processors run",
            libraries.len(),
            processors_run
        );

        Ok(LoaderInstallResult {
            main_class: profile.main_class,
            libraries,
            jvm_args: profile.jvm_args,
            game_args: profile.game_args,
            processors_run,
        })
    }

    async fn download_installer(
        &self,
        spec: &LoaderSpec,
        game_version: &str,
        session: &InstallSession,
    ) -> EngineResult<PathBuf> {
        let identifier = spec.installer_identifier(game_version);
        let artifact = MavenArtifact::parse(&identifier)?;
        let url = spec
            .installer_url
            .clone()
            .unwrap_or_else(|| artifact.url(&session.config.loader_repository));
        let dest = session.config.loaders_dir().join(artifact.filename());

        let mut entry = DownloadEntry::direct(&identifier, url, dest)
            .with_hash(spec.installer_sha1.as_deref().map(ExpectedHash::sha1));
        if spec.installer_sha1.is_none() {
            entry = entry.revalidated();
        }
        Ok(self.downloader.fetch(&entry, session).await?.path)
    }

    /// Bring every loader library into the libraries directory, from the
    /// installer archive when bundled, otherwise from its repository.
    async fn install_libraries(
        &self,
        profile: &LoaderInstallProfile,
        extracted: &Path,
        session: &InstallSession,
    ) -> EngineResult<Vec<String>> {
        let libs_dir = session.layout.libraries_dir();
        let mut names = Vec::new();
        let mut downloads = Vec::new();

        for lib in profile.merged_libraries() {
            let Some(resolved) = self.resolver.resolve(&lib, &session.platform).applicable() else {
                continue;
            };
            names.push(resolved.name.clone());

            for artifact in resolved.artifacts() {
                let legacy_bundle = profile
                    .bundled
                    .as_ref()
                    .filter(|b| b.identifier == lib.name)
                    .map(|b| extracted.join(&b.file_path));

                if let Some(source) = bundled_source(artifact, legacy_bundle, extracted) {
                    copy_bundled(&source, artifact, &libs_dir).await?;
                    continue;
                }
                if artifact.remote_url.is_some() {
                    downloads.push(DownloadEntry::for_artifact(artifact, &libs_dir));
                    continue;
                }
                if artifact.path_in(&libs_dir).is_file() {
                    debug!("{} already present", artifact.identifier);
                    continue;
                }
                return Err(EngineError::MissingLibrary(artifact.identifier.clone()));
            }
        }

        self.downloader.fetch_all(downloads, session).await?;

        if let (Some(bundled), true) = (&profile.bundled, session.side.is_server()) {
            let source = extracted.join(&bundled.file_path);
            if let Some(name) = source.file_name() {
                copy_verified(&source, &session.root().join(name), None, None).await?;
            }
        }

        Ok(names)
    }
}

fn bundled_source(
    artifact: &ResolvedArtifact,
    legacy_bundle: Option<PathBuf>,
    extracted: &Path,
) -> Option<PathBuf> {
    legacy_bundle
        .into_iter()
        .chain(std::iter::once(
            extracted.join("maven").join(&artifact.local_path),
        ))
        .find(|p| p.is_file())
}

/// The libraries directory is shared between instances: a copy that already
/// verifies is kept, anything else is replaced only by bytes that verify.
async fn copy_bundled(source: &Path, artifact: &ResolvedArtifact, libs_dir: &Path) -> EngineResult<()> {
    let target = artifact.path_in(libs_dir);
    if !needs_download_async(artifact.hash.as_ref(), artifact.size, &target).await? {
        debug!("{} already in the library cache", artifact.identifier);
        return Ok(());
    }
    copy_verified(source, &target, artifact.hash.as_ref(), artifact.size).await?;
    debug!("Copied bundled {:?} to {:?}", source, target);
    Ok(())
}

async fn read_profile(extracted: &Path) -> EngineResult<LoaderInstallProfile> {
    let profile_path = extracted.join("install_profile.json");
    let profile = tokio::fs::read_to_string(&profile_path)
        .await
        .map_err(|e| EngineError::ProfileParse(format!("{profile_path:?}: {e}")))?;

    let version_path = extracted.join("version.json");
    let version = match tokio::fs::read_to_string(&version_path).await {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(EngineError::io(&version_path)(e)),
    };

    parse_profile(&profile, version.as_deref())
}
