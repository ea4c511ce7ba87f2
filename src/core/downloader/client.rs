use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::browser::{locate_download, BrowserPrompt, SystemBrowser};
use super::strategy::{BrowserDownload, DownloadStrategy};
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::{
    hash_file_async, needs_download_async, verify_file_async, ExpectedHash, HashAlgorithm,
};
use crate::core::library::ResolvedArtifact;
use crate::core::session::InstallSession;

/// A single file to obtain, with whatever integrity data is known.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    /// Reported in progress and errors.
    pub name: String,
    pub url: Option<String>,
    pub dest: PathBuf,
    pub hash: Option<ExpectedHash>,
    pub size: Option<u64>,
    pub strategy: DownloadStrategy,
    /// Unhashed file revalidated with its ETag on every fetch.
    pub revalidate: bool,
}

impl DownloadEntry {
    pub fn direct(name: impl Into<String>, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            dest: dest.into(),
            hash: None,
            size: None,
            strategy: DownloadStrategy::Direct,
            revalidate: false,
        }
    }

    /// Entry for a resolved library artifact under `libs_dir`.
    pub fn for_artifact(artifact: &ResolvedArtifact, libs_dir: &Path) -> Self {
        Self {
            name: artifact.identifier.clone(),
            url: artifact.remote_url.clone(),
            dest: artifact.path_in(libs_dir),
            hash: artifact.hash.clone(),
            size: artifact.size,
            strategy: DownloadStrategy::Direct,
            revalidate: false,
        }
    }

    pub fn with_hash(mut self, hash: Option<ExpectedHash>) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_strategy(mut self, strategy: DownloadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn revalidated(mut self) -> Self {
        self.revalidate = true;
        self
    }
}

/// Where a fetch left its file and whether anything was transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    pub transferred: u64,
    pub skipped: bool,
}

impl Fetched {
    fn skipped(path: PathBuf) -> Self {
        Self {
            path,
            transferred: 0,
            skipped: true,
        }
    }

    fn done(path: PathBuf, transferred: u64) -> Self {
        Self {
            path,
            transferred,
            skipped: false,
        }
    }

    /// File name of the fetched file (pattern downloads may differ from the request).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// `<file>.hash` sidecar kept next to revalidated downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HashSidecar {
    sha1: String,
    #[serde(default)]
    etag: Option<String>,
}

/// Verified, atomic downloader shared by every install phase.
pub struct Downloader {
    client: Client,
    prompt: Arc<dyn BrowserPrompt>,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            prompt: Arc::new(SystemBrowser),
        }
    }

    pub fn with_browser_prompt(mut self, prompt: Arc<dyn BrowserPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Single fetch ────────────────────────────────────

    /// Obtain one file. A no-op when the destination already verifies.
    pub async fn fetch(&self, entry: &DownloadEntry, session: &InstallSession) -> EngineResult<Fetched> {
        session.ensure_active()?;

        let conditional = entry.revalidate && entry.hash.is_none();
        if !conditional && !needs_download_async(entry.hash.as_ref(), entry.size, &entry.dest).await? {
            debug!("Skipping {} (already valid at {:?})", entry.name, entry.dest);
            return Ok(Fetched::skipped(entry.dest.clone()));
        }

        if let Some(size) = entry.size {
            session.add_expected_bytes(size);
        }
        session.task_started(&entry.name);

        let fetched = match &entry.strategy {
            DownloadStrategy::Direct => {
                let url = entry
                    .url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| EngineError::Download {
                        url: String::new(),
                        reason: format!("{} has no download URL", entry.name),
                    })?;
                self.fetch_direct(entry, url, conditional, session).await?
            }
            DownloadStrategy::ServerProvided { source } => {
                self.fetch_staged(entry, source, session).await?
            }
            DownloadStrategy::BrowserAssisted(spec) => {
                self.fetch_via_browser(entry, spec, session).await?
            }
        };

        session.task_done(&entry.name);
        Ok(fetched)
    }

    async fn fetch_direct(
        &self,
        entry: &DownloadEntry,
        url: &str,
        conditional: bool,
        session: &InstallSession,
    ) -> EngineResult<Fetched> {
        let dest = &entry.dest;
        ensure_parent(dest).await?;

        let mut request = self.client.get(url);
        if conditional {
            if let Some(etag) = cached_etag(dest).await {
                request = request.header(IF_NONE_MATCH, etag);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            debug!("{} not modified since last fetch", entry.name);
            return Ok(Fetched::skipped(dest.clone()));
        }
        if !status.is_success() {
            return Err(EngineError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let part = part_path(dest);
        let transferred = write_part(&part, response.bytes_stream(), url, session).await?;
        commit(&part, dest, entry.hash.as_ref(), entry.size).await?;

        if conditional {
            write_sidecar(dest, etag).await?;
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(Fetched::done(dest.clone(), transferred))
    }

    async fn fetch_staged(
        &self,
        entry: &DownloadEntry,
        source: &Path,
        session: &InstallSession,
    ) -> EngineResult<Fetched> {
        if !source.is_file() {
            return Err(EngineError::Download {
                url: source.display().to_string(),
                reason: format!("staged file for {} is missing", entry.name),
            });
        }
        let copied = copy_verified(source, &entry.dest, entry.hash.as_ref(), entry.size).await?;
        session.add_downloaded_bytes(copied);

        debug!("Copied staged {:?} -> {:?}", source, entry.dest);
        Ok(Fetched::done(entry.dest.clone(), copied))
    }

    async fn fetch_via_browser(
        &self,
        entry: &DownloadEntry,
        spec: &BrowserDownload,
        session: &InstallSession,
    ) -> EngineResult<Fetched> {
        let cache_dir = entry
            .dest
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| EngineError::Other(format!("{:?} has no parent", entry.dest)))?;
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(EngineError::io(&cache_dir))?;

        let mut watched = Vec::new();
        if let Some(user_dir) = &session.config.user_downloads_dir {
            watched.push(user_dir.clone());
        }
        watched.push(cache_dir.clone());

        let interval = Duration::from_millis(session.config.browser_poll_interval_ms.max(1));
        let mut look = spec.file_pattern.is_none() || spec.check_before;
        let mut opened = false;

        loop {
            session.ensure_active()?;

            if look {
                if let Some(found) = locate_download(spec, &watched)? {
                    let name = match spec.file_pattern {
                        Some(_) => found
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_else(|| spec.file_name.clone()),
                        None => spec.file_name.clone(),
                    };
                    let dest = cache_dir.join(name);
                    if found != dest {
                        move_file(&found, &dest).await?;
                    }
                    let size = tokio::fs::metadata(&dest)
                        .await
                        .map_err(EngineError::io(&dest))?
                        .len();
                    if let Err(e) = verify_file_async(entry.hash.as_ref(), None, &dest).await {
                        let _ = tokio::fs::remove_file(&dest).await;
                        return Err(e);
                    }
                    info!("Using browser download {:?} for {}", dest, entry.name);
                    return Ok(Fetched::done(dest, size));
                }
            }

            if !opened {
                self.prompt
                    .request_download(&entry.name, &spec.page_url, &watched)
                    .await?;
                opened = true;
                look = true;
            } else if !self.prompt.still_waiting(&entry.name).await {
                session.cancel(&format!("browser download of {} abandoned", entry.name));
                return Err(EngineError::Cancelled);
            }

            tokio::time::sleep(interval).await;
        }
    }

    // ── Batch ───────────────────────────────────────────

    /// Fetch many files with bounded concurrency. Results come back in the
    /// order of `entries`.
    ///
    /// The first fatal failure cancels the session so no further fetches
    /// start; that failure is what gets returned.
    pub async fn fetch_all(
        &self,
        entries: Vec<DownloadEntry>,
        session: &InstallSession,
    ) -> EngineResult<Vec<Fetched>> {
        let concurrency = session.config.concurrency();
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            concurrency
        );

        let mut results: Vec<(usize, EngineResult<Fetched>)> = stream::iter(entries.into_iter().enumerate())
            .map(|(index, entry)| async move {
                (index, session.guard(self.fetch(&entry, session).await))
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut fetched = Vec::with_capacity(results.len());
        let mut cancelled = false;
        let mut first_error = None;
        for (_, result) in results {
            match result {
                Ok(f) => fetched.push(f),
                Err(EngineError::Cancelled) => cancelled = true,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if cancelled {
            return Err(EngineError::Cancelled);
        }
        Ok(fetched)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!("{}.part-{}", name, uuid::Uuid::new_v4()))
}

fn sidecar_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!("{name}.hash"))
}

async fn ensure_parent(dest: &Path) -> EngineResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(EngineError::io(parent))?;
    }
    Ok(())
}

/// Stream a response body into `part`. A partial file is removed when the
/// transfer or a write fails.
async fn write_part<S, B, E>(
    part: &Path,
    body: S,
    url: &str,
    session: &InstallSession,
) -> EngineResult<u64>
where
    S: futures_util::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let result = stream_into(part, body, url, session).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(part).await;
    }
    result
}

async fn stream_into<S, B, E>(
    part: &Path,
    body: S,
    url: &str,
    session: &InstallSession,
) -> EngineResult<u64>
where
    S: futures_util::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(EngineError::io(part))?;
    let mut body = std::pin::pin!(body);
    let mut transferred = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| EngineError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await.map_err(EngineError::io(part))?;
        transferred += bytes.len() as u64;
        session.add_downloaded_bytes(bytes.len() as u64);
    }
    file.flush().await.map_err(EngineError::io(part))?;
    // Handle dropped here, before rename; Windows refuses to rename open files.
    Ok(transferred)
}

/// Copy a local file into `dest` through a temporary sibling, checked
/// against the expected hash and size before it replaces anything.
pub async fn copy_verified(
    source: &Path,
    dest: &Path,
    hash: Option<&ExpectedHash>,
    size: Option<u64>,
) -> EngineResult<u64> {
    ensure_parent(dest).await?;
    let part = part_path(dest);
    let copied = match tokio::fs::copy(source, &part).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(EngineError::io(source)(e));
        }
    };
    commit(&part, dest, hash, size).await?;
    Ok(copied)
}

/// Verify a finished temporary file and move it into place.
async fn commit(
    part: &Path,
    dest: &Path,
    hash: Option<&ExpectedHash>,
    size: Option<u64>,
) -> EngineResult<()> {
    if let Err(e) = verify_file_async(hash, size, part).await {
        let _ = tokio::fs::remove_file(part).await;
        return Err(match e {
            EngineError::HashMismatch { expected, actual, .. } => EngineError::HashMismatch {
                path: dest.to_path_buf(),
                expected,
                actual,
            },
            EngineError::SizeMismatch { expected, actual, .. } => EngineError::SizeMismatch {
                path: dest.to_path_buf(),
                expected,
                actual,
            },
            other => other,
        });
    }
    tokio::fs::rename(part, dest)
        .await
        .map_err(EngineError::io(dest))
}

/// ETag recorded for `dest`, only while the file still matches its sidecar.
async fn cached_etag(dest: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(sidecar_path(dest)).await.ok()?;
    let sidecar: HashSidecar = serde_json::from_str(&raw).ok()?;
    let etag = sidecar.etag?;
    let actual = hash_file_async(HashAlgorithm::Sha1, dest).await.ok()?;
    if actual.eq_ignore_ascii_case(&sidecar.sha1) {
        Some(etag)
    } else {
        warn!("{:?} changed since it was downloaded; fetching again", dest);
        None
    }
}

async fn write_sidecar(dest: &Path, etag: Option<String>) -> EngineResult<()> {
    let sha1 = hash_file_async(HashAlgorithm::Sha1, dest).await?;
    let path = sidecar_path(dest);
    let json = serde_json::to_string_pretty(&HashSidecar { sha1, etag })?;
    tokio::fs::write(&path, json)
        .await
        .map_err(EngineError::io(&path))
}

/// Rename, falling back to copy + delete across filesystems.
async fn move_file(from: &Path, to: &Path) -> EngineResult<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await.map_err(EngineError::io(to))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(EngineError::io(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::strategy::FilePreference;
    use crate::core::hashing::{hash_bytes, needs_download};
    use crate::core::session::test_support::session_in;
    use crate::core::session::Side;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> Downloader {
        Downloader::new(Client::new())
    }

    #[tokio::test]
    async fn direct_fetch_verifies_and_then_skips() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lib.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let dest = dir.path().join("libs/lib.jar");
        let entry = DownloadEntry::direct("lib", format!("{}/lib.jar", server.uri()), &dest)
            .with_hash(Some(ExpectedHash::sha1(hash_bytes(HashAlgorithm::Sha1, b"hello"))))
            .with_size(Some(5));

        let first = downloader().fetch(&entry, &session).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(session.downloaded_bytes(), 5);
        assert!(!needs_download(entry.hash.as_ref(), entry.size, &dest).unwrap());

        let second = downloader().fetch(&entry, &session).await.unwrap();
        assert!(second.skipped);
        assert_eq!(session.downloaded_bytes(), 5);
    }

    #[tokio::test]
    async fn hash_mismatch_leaves_no_file_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let dest = dir.path().join("libs/lib.jar");
        let entry = DownloadEntry::direct("lib", format!("{}/lib.jar", server.uri()), &dest)
            .with_hash(Some(ExpectedHash::sha1(hash_bytes(HashAlgorithm::Sha1, b"hello"))));

        let err = downloader().fetch(&entry, &session).await.unwrap_err();
        assert!(matches!(err, EngineError::HashMismatch { .. }));
        assert!(!dest.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("libs")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn interrupted_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let libs = dir.path().join("libs");
        std::fs::create_dir_all(&libs).unwrap();
        let part = part_path(&libs.join("lib.jar"));
        let body = stream::iter(vec![
            Ok(b"first chunk".to_vec()),
            Err("connection reset by peer"),
        ]);

        let err = write_part(&part, body, "http://host/lib.jar", &session)
            .await
            .unwrap_err();
        match err {
            EngineError::Download { url, reason } => {
                assert_eq!(url, "http://host/lib.jar");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!part.exists());
        assert_eq!(std::fs::read_dir(&libs).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let entry = DownloadEntry::direct("x", format!("{}/x.jar", server.uri()), dir.path().join("x.jar"));
        let err = downloader().fetch(&entry, &session).await.unwrap_err();
        assert!(matches!(err, EngineError::DownloadFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn cancelled_session_starts_no_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        session.cancel("test");
        let entry = DownloadEntry::direct("x", "http://127.0.0.1:9/x.jar", dir.path().join("x.jar"));
        assert!(matches!(
            downloader().fetch(&entry, &session).await,
            Err(EngineError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn revalidated_fetch_uses_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_bytes(b"installer".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let dest = dir.path().join("loaders/installer.jar");
        let entry =
            DownloadEntry::direct("installer", format!("{}/installer.jar", server.uri()), &dest).revalidated();

        let first = downloader().fetch(&entry, &session).await.unwrap();
        assert!(!first.skipped);
        assert!(sidecar_path(&dest).is_file());

        let second = downloader().fetch(&entry, &session).await.unwrap();
        assert!(second.skipped);
        assert_eq!(std::fs::read(&dest).unwrap(), b"installer");
    }

    #[tokio::test]
    async fn staged_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Server);
        let staged = dir.path().join("staged/mod.jar");
        std::fs::create_dir_all(staged.parent().unwrap()).unwrap();
        std::fs::write(&staged, b"bundled").unwrap();

        let dest = dir.path().join("downloads/mod.jar");
        let mut entry = DownloadEntry::direct("mod", "", &dest)
            .with_strategy(DownloadStrategy::ServerProvided { source: staged });
        entry.url = None;

        let fetched = downloader().fetch(&entry, &session).await.unwrap();
        assert_eq!(fetched.transferred, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"bundled");
    }

    struct SavesFile {
        target: PathBuf,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl BrowserPrompt for SavesFile {
        async fn request_download(&self, _name: &str, _url: &str, _watched: &[PathBuf]) -> EngineResult<()> {
            std::fs::write(&self.target, b"from browser").unwrap();
            Ok(())
        }

        async fn still_waiting(&self, _name: &str) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    struct GivesUp;

    #[async_trait]
    impl BrowserPrompt for GivesUp {
        async fn request_download(&self, _name: &str, _url: &str, _watched: &[PathBuf]) -> EngineResult<()> {
            Ok(())
        }

        async fn still_waiting(&self, _name: &str) -> bool {
            false
        }
    }

    fn browser_entry(dest: &Path) -> DownloadEntry {
        DownloadEntry::direct("Optifine", "", dest).with_strategy(DownloadStrategy::BrowserAssisted(
            BrowserDownload {
                page_url: "https://example.invalid/optifine".into(),
                file_name: "OptiFine.jar".into(),
                file_pattern: None,
                preference: FilePreference::First,
                check_before: false,
            },
        ))
    }

    #[tokio::test]
    async fn browser_download_is_moved_into_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), Side::Client);
        let user_downloads = dir.path().join("user-downloads");
        std::fs::create_dir_all(&user_downloads).unwrap();
        session.config.user_downloads_dir = Some(user_downloads.clone());
        session.config.browser_poll_interval_ms = 1;

        let dest = dir.path().join("data/downloads/OptiFine.jar");
        let prompt = Arc::new(SavesFile {
            target: user_downloads.join("OptiFine.jar"),
            polls: AtomicUsize::new(0),
        });
        let fetched = downloader()
            .with_browser_prompt(prompt)
            .fetch(&browser_entry(&dest), &session)
            .await
            .unwrap();

        assert_eq!(fetched.path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"from browser");
        assert!(!user_downloads.join("OptiFine.jar").exists());
    }

    #[tokio::test]
    async fn abandoning_browser_download_cancels_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path(), Side::Client);
        session.config.user_downloads_dir = None;
        session.config.browser_poll_interval_ms = 1;

        let dest = dir.path().join("data/downloads/OptiFine.jar");
        let err = downloader()
            .with_browser_prompt(Arc::new(GivesUp))
            .fetch(&browser_entry(&dest), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
        assert!(session.is_cancelled());
    }

    #[tokio::test]
    async fn batch_failure_cancels_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.jar"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), Side::Client);
        let entries = vec![
            DownloadEntry::direct("ok", format!("{}/ok.jar", server.uri()), dir.path().join("ok.jar")),
            DownloadEntry::direct(
                "missing",
                format!("{}/missing.jar", server.uri()),
                dir.path().join("missing.jar"),
            ),
        ];

        let err = downloader().fetch_all(entries, &session).await.unwrap_err();
        assert!(matches!(err, EngineError::DownloadFailed { status: 500, .. }));
        assert!(session.is_cancelled());
    }
}
