// ─── Install Session ───
// Per-attempt state shared by every component: platform, side, cancellation,
// progress counters, and bookkeeping about what has been placed so far.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::core::instance::InstanceLayout;
use crate::core::platform::HostPlatform;

/// Whether the install produces a playable client or a dedicated server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Side::Server)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress callbacks owned by the surrounding application.
pub trait ProgressSink: Send + Sync {
    fn task_started(&self, name: &str);
    fn task_progress(&self, done: u64, total: Option<u64>);
    fn task_done(&self, name: &str);
}

/// Default sink: forwards progress to `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn task_started(&self, name: &str) {
        info!("▶ {}", name);
    }

    fn task_progress(&self, done: u64, total: Option<u64>) {
        match total {
            Some(total) => debug!("progress {}/{}", done, total),
            None => debug!("progress {}", done),
        }
    }

    fn task_done(&self, name: &str) {
        debug!("✓ {}", name);
    }
}

/// Cloneable handle that cancels a session from another task (e.g. Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One install attempt. Short-lived; discarded after the run.
pub struct InstallSession {
    pub config: EngineConfig,
    pub platform: HostPlatform,
    pub side: Side,
    pub layout: InstanceLayout,
    /// Whether the target game version still loads `coremods/`.
    pub uses_coremods: bool,
    cancel: CancelHandle,
    progress: Arc<dyn ProgressSink>,
    bytes_downloaded: AtomicU64,
    bytes_total: AtomicU64,
    tasks_done: AtomicU64,
    jar_order: Mutex<Vec<String>>,
    installed: Mutex<HashMap<String, PathBuf>>,
}

impl InstallSession {
    pub fn new(
        config: EngineConfig,
        platform: HostPlatform,
        side: Side,
        layout: InstanceLayout,
        uses_coremods: bool,
    ) -> Self {
        Self {
            config,
            platform,
            side,
            layout,
            uses_coremods,
            cancel: CancelHandle::default(),
            progress: Arc::new(LogProgress),
            bytes_downloaded: AtomicU64::new(0),
            bytes_total: AtomicU64::new(0),
            tasks_done: AtomicU64::new(0),
            jar_order: Mutex::new(Vec::new()),
            installed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    // ── Cancellation ────────────────────────────────────

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the session, logging the reason.
    pub fn cancel(&self, reason: &str) {
        if !self.cancel.is_cancelled() {
            error!("Cancelling install: {}", reason);
        }
        self.cancel.cancel();
    }

    /// Step-boundary check: fails with `Cancelled` once the flag is set.
    pub fn ensure_active(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Pass a result through, cancelling the session on fatal errors.
    pub fn guard<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() && !matches!(e, EngineError::Cancelled) {
                self.cancel(&e.to_string());
            }
        }
        result
    }

    // ── Progress ────────────────────────────────────────

    pub fn task_started(&self, name: &str) {
        self.progress.task_started(name);
    }

    pub fn task_done(&self, name: &str) {
        self.tasks_done.fetch_add(1, Ordering::Relaxed);
        self.progress.task_done(name);
    }

    pub fn add_expected_bytes(&self, bytes: u64) {
        self.bytes_total.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count bytes actually transferred (never called for skipped files).
    pub fn add_downloaded_bytes(&self, bytes: u64) {
        let done = self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let total = self.bytes_total.load(Ordering::Relaxed);
        self.progress
            .task_progress(done, (total > 0).then_some(total));
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    pub fn tasks_done(&self) -> u64 {
        self.tasks_done.load(Ordering::Relaxed)
    }

    // ── Bookkeeping ─────────────────────────────────────

    /// Append to the jar load order unless the file name is already present.
    /// Returns whether an entry was added.
    pub fn add_to_jar_order(&self, file_name: &str) -> bool {
        let mut order = self.jar_order.lock().unwrap_or_else(|e| e.into_inner());
        if order.iter().any(|existing| existing == file_name) {
            debug!("{} already in jar order", file_name);
            return false;
        }
        order.push(file_name.to_string());
        true
    }

    pub fn jar_order(&self) -> Vec<String> {
        self.jar_order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remember where a mod's placed file ended up.
    pub fn record_installed(&self, mod_name: &str, path: PathBuf) {
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(mod_name.to_string(), path);
    }

    pub fn installed_file(&self, mod_name: &str) -> Option<PathBuf> {
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(mod_name)
            .cloned()
    }
}
