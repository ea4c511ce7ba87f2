use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use super::strategy::{BrowserDownload, FilePreference};
use crate::core::error::{EngineError, EngineResult};

/// The user side of a browser-assisted download.
#[async_trait]
pub trait BrowserPrompt: Send + Sync {
    /// Ask the user to fetch `name` from `url` and save it into one of `watched`.
    async fn request_download(&self, name: &str, url: &str, watched: &[PathBuf]) -> EngineResult<()>;

    /// Polled while the file has not appeared. `false` abandons the install.
    async fn still_waiting(&self, name: &str) -> bool;
}

/// Opens the page with the platform opener and waits until cancelled.
#[derive(Debug, Default)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserPrompt for SystemBrowser {
    async fn request_download(&self, name: &str, url: &str, watched: &[PathBuf]) -> EngineResult<()> {
        info!(
            "Please download {} from {} and save it into {:?}",
            name, url, watched
        );
        open_in_browser(url).await
    }

    async fn still_waiting(&self, _name: &str) -> bool {
        true
    }
}

/// Launch the platform's URL opener without blocking the runtime.
pub async fn open_in_browser(url: &str) -> EngineResult<()> {
    // explorer exits non-zero even on success, so only spawn failures count.
    opener_command(url)
        .status()
        .await
        .map_err(|e| EngineError::Download {
            url: url.to_string(),
            reason: format!("could not open browser: {e}"),
        })?;
    Ok(())
}

fn opener_command(url: &str) -> Command {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let mut command = Command::new(program);
    command.arg(url);
    command
}

/// Find the user's copy of a browser download in `dirs`.
///
/// Exact names also match a `.zip` suffix some browsers append. Pattern
/// candidates are ordered by name across all directories and picked per
/// `preference`.
pub fn locate_download(spec: &BrowserDownload, dirs: &[PathBuf]) -> EngineResult<Option<PathBuf>> {
    match &spec.file_pattern {
        Some(pattern) => {
            let re = Regex::new(pattern)?;
            let mut candidates = Vec::new();
            for dir in dirs {
                candidates.extend(matching_files(dir, &re)?);
            }
            candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            let picked = match spec.preference {
                FilePreference::First => candidates.into_iter().next(),
                FilePreference::Last => candidates.into_iter().next_back(),
            };
            Ok(picked)
        }
        None => {
            let zipped = format!("{}.zip", spec.file_name);
            for dir in dirs {
                for name in [spec.file_name.as_str(), zipped.as_str()] {
                    let candidate = dir.join(name);
                    if candidate.is_file() {
                        debug!("Found browser download at {:?}", candidate);
                        return Ok(Some(candidate));
                    }
                }
            }
            Ok(None)
        }
    }
}

fn matching_files(dir: &Path, re: &Regex) -> EngineResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EngineError::io(dir)(e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(EngineError::io(dir))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if re.is_match(name) {
                found.push(path);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(file_name: &str, pattern: Option<&str>, preference: FilePreference) -> BrowserDownload {
        BrowserDownload {
            page_url: "https://example.invalid/page".into(),
            file_name: file_name.into(),
            file_pattern: pattern.map(str::to_string),
            preference,
            check_before: true,
        }
    }

    #[test]
    fn exact_name_matches_zip_suffixed_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Mod.jar.zip"), b"x").unwrap();

        let found = locate_download(
            &spec("Mod.jar", None, FilePreference::First),
            &[dir.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found, Some(dir.path().join("Mod.jar.zip")));
    }

    #[test]
    fn pattern_honours_preference() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["mod-1.0.jar", "mod-1.1.jar", "other.jar"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        // Name order wins over modification time.
        let newest = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(dir.path().join("mod-1.0.jar"))
            .unwrap()
            .set_modified(newest)
            .unwrap();
        let dirs = [dir.path().to_path_buf()];

        let first = locate_download(&spec("", Some(r"^mod-.*\.jar$"), FilePreference::First), &dirs)
            .unwrap()
            .unwrap();
        let last = locate_download(&spec("", Some(r"^mod-.*\.jar$"), FilePreference::Last), &dirs)
            .unwrap()
            .unwrap();
        assert_eq!(first.file_name().unwrap(), "mod-1.0.jar");
        assert_eq!(last.file_name().unwrap(), "mod-1.1.jar");
    }

    #[test]
    fn opener_targets_the_page_url() {
        let command = opener_command("https://example.invalid/page");
        let inner = command.as_std();
        if cfg!(all(unix, not(target_os = "macos"))) {
            assert_eq!(inner.get_program(), "xdg-open");
        }
        let args: Vec<_> = inner.get_args().collect();
        assert_eq!(args, ["https://example.invalid/page"]);
    }

    #[test]
    fn missing_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let found = locate_download(
            &spec("", Some("x"), FilePreference::First),
            &[dir.path().join("nope")],
        )
        .unwrap();
        assert!(found.is_none());
    }
}
