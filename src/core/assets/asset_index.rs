use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::{ExpectedHash, ObjectStore};
use crate::core::manifest::AssetIndexRef;
use crate::core::session::InstallSession;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetReport {
    /// Distinct objects referenced by the index.
    pub objects: usize,
    /// Objects actually transferred this run.
    pub fetched: usize,
}

/// Download the asset index into `indexes/<id>.json` and every object it
/// names into the content-addressed store under `objects/`.
pub async fn download_assets(
    index: &AssetIndexRef,
    assets_dir: &Path,
    resources_base: &str,
    downloader: &Downloader,
    session: &InstallSession,
) -> EngineResult<AssetReport> {
    let index_path = assets_dir.join("indexes").join(format!("{}.json", index.id));
    let entry = DownloadEntry::direct(format!("asset index {}", index.id), &index.url, &index_path)
        .with_hash(index.sha1.as_deref().map(ExpectedHash::sha1));
    let entry = if index.sha1.is_none() {
        entry.revalidated()
    } else {
        entry
    };
    session.guard(downloader.fetch(&entry, session).await)?;

    let raw = tokio::fs::read_to_string(&index_path)
        .await
        .map_err(EngineError::io(&index_path))?;
    let parsed: AssetIndex = serde_json::from_str(&raw)?;

    // Several names may share one object.
    let unique: BTreeMap<String, u64> = parsed
        .objects
        .values()
        .map(|obj| (obj.hash.to_ascii_lowercase(), obj.size))
        .collect();

    let store = ObjectStore::new(assets_dir.join("objects"));
    let base = resources_base.trim_end_matches('/');
    let entries: Vec<DownloadEntry> = unique
        .iter()
        .map(|(hash, size)| {
            let relative = format!("{}/{}", &hash[..hash.len().min(2)], hash);
            DownloadEntry::direct(
                format!("asset {hash}"),
                format!("{base}/{relative}"),
                store.object_path(hash),
            )
            .with_hash(Some(ExpectedHash::sha1(hash.clone())))
            .with_size(Some(*size))
        })
        .collect();

    let fetched = downloader.fetch_all(entries, session).await?;
    let report = AssetReport {
        objects: unique.len(),
        fetched: fetched.iter().filter(|f| !f.skipped).count(),
    };
    info!(
        "Assets {}: {} objects, {} downloaded",
        index.id, report.objects, report.fetched
    );
    Ok(report)
}
