mod browser;
mod client;
mod strategy;

pub use browser::{locate_download, open_in_browser, BrowserPrompt, SystemBrowser};
pub use client::{copy_verified, DownloadEntry, Downloader, Fetched};
pub use strategy::{BrowserDownload, DownloadStrategy, FilePreference};
