use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How an artifact reaches the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Plain HTTP GET.
    Direct,
    /// Copy from a file staged on disk alongside the pack.
    ServerProvided { source: PathBuf },
    /// The user fetches it in a browser; the launcher watches for the file.
    BrowserAssisted(BrowserDownload),
}

/// Which candidate wins when a file pattern matches several files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilePreference {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserDownload {
    /// Page opened in the user's browser.
    pub page_url: String,
    /// Expected file name; ignored for matching when `file_pattern` is set.
    pub file_name: String,
    /// Regex matched against file names in the watched directories.
    pub file_pattern: Option<String>,
    pub preference: FilePreference,
    /// Look for a pattern match before opening the browser.
    pub check_before: bool,
}
