use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installation engine.
/// Every module returns `Result<T, EngineError>`.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    // ── Integrity ───────────────────────────────────────
    #[error("Hash mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {path:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    // ── Libraries ───────────────────────────────────────
    #[error("Unresolvable library identifier: {0}")]
    UnresolvableLibrary(String),

    #[error("Required library {0} is neither downloadable nor bundled with the installer")]
    MissingLibrary(String),

    // ── Mods ────────────────────────────────────────────
    #[error("Failed to install mod {name}: {reason}")]
    Install { name: String, reason: String },

    #[error("Invalid mod selection: {0}")]
    ModSelection(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Loader install profile error: {0}")]
    ProfileParse(String),

    #[error("Processor {jar} failed (code {code:?})\nSTDOUT:\n{stdout}\nSTDERR:\n{stderr}")]
    ProcessorFailure {
        jar: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Processor {jar} could not be executed: {source}")]
    ProcessorIo {
        jar: String,
        source: std::io::Error,
    },

    // ── Session ─────────────────────────────────────────
    #[error("Install session was cancelled")]
    Cancelled,

    // ── Parsing ─────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(source: std::io::Error) -> Self {
        EngineError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<walkdir::Error> for EngineError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
        EngineError::Io { path, source }
    }
}

impl EngineError {
    /// Attach a path to an IO error (`.map_err(EngineError::io(&path))`).
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> EngineError {
        let path = path.into();
        move |source| EngineError::Io { path, source }
    }

    /// Whether this error should abort the whole install session.
    ///
    /// Only library resolution degrades; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::UnresolvableLibrary(_))
    }
}
