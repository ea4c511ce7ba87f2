// ─── Pack Installer ───
// Drives one InstallSession end to end: mod selection, game jar, libraries,
// loader, mods, collectors, actions, assets, install record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::actions::{ActionPipeline, ActionReport};
use crate::core::assets::{download_assets, AssetReport, RESOURCES_URL};
use crate::core::config::EngineConfig;
use crate::core::downloader::{BrowserDownload, DownloadEntry, DownloadStrategy, Downloader};
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::ExpectedHash;
use crate::core::http::build_http_client;
use crate::core::instance::{InstallRecord, InstalledMod, InstanceLayout};
use crate::core::library::{extract_natives, LibraryResolver, ResolvedLibrary};
use crate::core::loaders::{LoaderInstaller, ProcessRunner, SubprocessRunner};
use crate::core::manifest::{select_mods, DownloadType, FileCheck, ModRef, PackVersion};
use crate::core::mods::{self, ModInstallStrategyRegistry};
use crate::core::platform::HostPlatform;
use crate::core::session::{InstallSession, Side};

/// What to install and where.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub manifest: PackVersion,
    pub side: Side,
    pub root: PathBuf,
    /// Optional mods chosen by the user; `None` takes the pack defaults.
    pub selection: Option<Vec<String>>,
    /// Directory holding files for `server` download mods.
    pub staged_files_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub record: InstallRecord,
    pub libraries: usize,
    pub mods_installed: usize,
    pub actions: ActionReport,
    pub assets: Option<AssetReport>,
    pub downloaded_bytes: u64,
}

pub struct PackInstaller {
    config: EngineConfig,
    platform: HostPlatform,
    downloader: Downloader,
    resolver: LibraryResolver,
    registry: ModInstallStrategyRegistry,
    runner: Arc<dyn ProcessRunner>,
    resources_base: String,
}

impl PackInstaller {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let downloader = Downloader::new(build_http_client()?);
        let resolver = LibraryResolver::from_config(&config)?;
        Ok(Self {
            config,
            platform: HostPlatform::current(),
            downloader,
            resolver,
            registry: ModInstallStrategyRegistry::new(),
            runner: Arc::new(SubprocessRunner),
            resources_base: RESOURCES_URL.to_string(),
        })
    }

    pub fn with_platform(mut self, platform: HostPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_resolver(mut self, resolver: LibraryResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_resources_base(mut self, base: impl Into<String>) -> Self {
        self.resources_base = base.into();
        self
    }

    /// A fresh session for `request` with its own scratch directory.
    pub fn session_for(&self, request: &InstallRequest) -> InstallSession {
        let temp = self
            .config
            .temp_dir()
            .join(uuid::Uuid::new_v4().to_string());
        let layout = InstanceLayout::new(
            &request.root,
            self.config.libraries_dir(),
            temp,
            request.side,
            &request.manifest.minecraft,
        );
        InstallSession::new(
            self.config.clone(),
            self.platform.clone(),
            request.side,
            layout,
            request.manifest.uses_coremods(),
        )
    }

    /// Run the whole install. Any fatal error cancels the session and is
    /// returned naming the artifact, mod or processor that failed.
    pub async fn install(
        &self,
        request: &InstallRequest,
        session: &InstallSession,
    ) -> EngineResult<InstallReport> {
        let result = self.run(request, session).await;
        let result = session.guard(result);

        let temp = session.layout.temp_dir();
        if let Err(e) = tokio::fs::remove_dir_all(temp).await {
            debug!("Leaving scratch directory {:?}: {}", temp, e);
        }
        result
    }

    async fn run(&self, request: &InstallRequest, session: &InstallSession) -> EngineResult<InstallReport> {
        let manifest = &request.manifest;
        let side = request.side;
        info!(
            "Installing {} {} ({}) into {:?}",
            manifest.pack,
            manifest.version,
            side.as_str(),
            request.root
        );

        let selected = select_mods(&manifest.mods, side, request.selection.as_deref())?;
        info!("{} mods selected", selected.len());

        self.fetch_game_jar(manifest, session).await?;

        let libraries = self.install_libraries(manifest, session).await?;
        let mut record = InstallRecord::new(&manifest.pack, &manifest.version, &manifest.minecraft, side);
        record.libraries = libraries.iter().map(|l| l.name.clone()).collect();

        if let Some(loader) = &manifest.loader {
            session.ensure_active()?;
            let mut installer = LoaderInstaller::new(&self.downloader, &self.resolver)
                .with_runner(self.runner.clone());
            let loader_result = installer.install(loader, session).await?;
            record.main_class = Some(loader_result.main_class);
            record.jvm_args = loader_result.jvm_args;
            record.game_args = loader_result.game_args;
            for name in loader_result.libraries {
                if !record.libraries.contains(&name) {
                    record.libraries.push(name);
                }
            }
        }

        let sources = self.fetch_mods(&selected, request, session).await?;

        // Placement reads files earlier placements wrote; strictly sequential.
        let server_jar_staged = mods::stage_server_jar(session, &selected)?;
        for mod_ref in &selected {
            let source = sources.get(&mod_ref.name).map(PathBuf::as_path);
            self.registry.install(mod_ref, source, session)?;
        }
        mods::finalize(session, server_jar_staged)?;

        let actions = ActionPipeline::new(session).execute(&manifest.actions)?;

        let assets = match (&manifest.asset_index, side) {
            (Some(index), Side::Client) => Some(
                download_assets(
                    index,
                    &session.config.assets_dir(),
                    &self.resources_base,
                    &self.downloader,
                    session,
                )
                .await?,
            ),
            _ => None,
        };

        session.ensure_active()?;
        record.mods = selected
            .iter()
            .filter_map(|m| {
                let file = session
                    .installed_file(&m.name)
                    .or_else(|| sources.get(&m.name).cloned())?;
                Some(InstalledMod {
                    name: m.name.clone(),
                    kind: m.kind_for(side),
                    file: relative_to(&file, session.root()),
                })
            })
            .collect();
        record.jar_order = session.jar_order();
        record.save(&session.layout.record_path()).await?;

        info!("Installed {} {}", manifest.pack, manifest.version);
        Ok(InstallReport {
            libraries: libraries.len(),
            mods_installed: record.mods.len(),
            actions,
            assets,
            downloaded_bytes: session.downloaded_bytes(),
            record,
        })
    }

    async fn fetch_game_jar(&self, manifest: &PackVersion, session: &InstallSession) -> EngineResult<()> {
        let Some(jar) = manifest.downloads.as_ref().and_then(|d| d.for_side(session.side)) else {
            debug!("Manifest has no {} jar download", session.side.as_str());
            return Ok(());
        };
        let entry = DownloadEntry::direct(
            format!("minecraft {} jar", session.side.as_str()),
            &jar.url,
            session.layout.game_jar_path(),
        )
        .with_hash(jar.sha1.as_deref().map(ExpectedHash::sha1))
        .with_size(jar.size);
        self.downloader.fetch(&entry, session).await?;
        Ok(())
    }

    /// Resolve, fetch and (client side) unpack natives for the pack's
    /// libraries.
    async fn install_libraries(
        &self,
        manifest: &PackVersion,
        session: &InstallSession,
    ) -> EngineResult<Vec<ResolvedLibrary>> {
        session.ensure_active()?;
        let libs_dir = session.layout.libraries_dir();

        let resolved: Vec<ResolvedLibrary> = manifest
            .libraries
            .iter()
            .filter_map(|lib| self.resolver.resolve(lib, &session.platform).applicable())
            .collect();

        let mut entries = Vec::new();
        for artifact in resolved.iter().flat_map(|lib| lib.artifacts()) {
            if artifact.remote_url.is_some() {
                entries.push(DownloadEntry::for_artifact(artifact, &libs_dir));
            } else if !artifact.path_in(&libs_dir).is_file() {
                return Err(EngineError::MissingLibrary(artifact.identifier.clone()));
            }
        }
        info!(
            "{} of {} libraries apply to {}",
            resolved.len(),
            manifest.libraries.len(),
            session.platform
        );
        self.downloader.fetch_all(entries, session).await?;

        if !session.side.is_server() {
            let natives_dir = session.layout.natives_dir();
            for lib in &resolved {
                if let Some(natives) = &lib.natives {
                    extract_natives(natives, lib.extract.as_ref(), &libs_dir, &natives_dir)?;
                }
            }
        }

        Ok(resolved)
    }

    /// Fetch every selected mod that needs a file, into the download cache.
    /// Returns mod name → fetched file.
    async fn fetch_mods(
        &self,
        selected: &[ModRef],
        request: &InstallRequest,
        session: &InstallSession,
    ) -> EngineResult<HashMap<String, PathBuf>> {
        session.ensure_active()?;
        let downloads_dir = session.config.downloads_dir();

        let mut names = Vec::new();
        let mut entries = Vec::new();
        for mod_ref in selected {
            if !ModInstallStrategyRegistry::needs_file(mod_ref.kind_for(session.side)) {
                continue;
            }
            entries.push(self.mod_entry(mod_ref, request, &downloads_dir, session.side)?);
            names.push(mod_ref.name.clone());
        }

        let fetched = self.downloader.fetch_all(entries, session).await?;
        Ok(names
            .into_iter()
            .zip(fetched.into_iter().map(|f| f.path))
            .collect())
    }

    fn mod_entry(
        &self,
        mod_ref: &ModRef,
        request: &InstallRequest,
        downloads_dir: &Path,
        side: Side,
    ) -> EngineResult<DownloadEntry> {
        let file_name = mod_ref.file_name(side);
        let url = mod_ref.url_for(side).unwrap_or_default().to_string();
        let fail = |reason: String| EngineError::Install {
            name: mod_ref.name.clone(),
            reason,
        };

        let strategy = match mod_ref.download_for(side) {
            DownloadType::Direct => DownloadStrategy::Direct,
            DownloadType::Server => {
                let staged = request
                    .staged_files_dir
                    .as_ref()
                    .ok_or_else(|| fail("no staged files directory for a server download".into()))?;
                DownloadStrategy::ServerProvided {
                    source: staged.join(&file_name),
                }
            }
            DownloadType::Browser => DownloadStrategy::BrowserAssisted(BrowserDownload {
                page_url: url.clone(),
                file_name: file_name.clone(),
                file_pattern: mod_ref.file_pattern.then(|| mod_ref.file.clone()),
                preference: mod_ref.file_preference,
                check_before: mod_ref.file_check == Some(FileCheck::Before),
            }),
        };

        Ok(DownloadEntry::direct(&mod_ref.name, url, downloads_dir.join(&file_name))
            .with_hash(mod_ref.expected_hash(side))
            .with_size(mod_ref.size)
            .with_strategy(strategy))
    }
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
