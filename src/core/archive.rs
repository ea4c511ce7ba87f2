// ─── Zip Helpers ───
// Extraction and re-packing shared by mod strategies, actions and the loader.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::core::error::{EngineError, EngineResult};

/// Extract `archive` into `dest`, skipping entries whose name starts with any
/// of `exclude`. Entries that would escape `dest` are rejected.
///
/// Returns the number of files written.
pub fn unzip(archive: &Path, dest: &Path, exclude: &[String]) -> EngineResult<usize> {
    let file = File::open(archive).map_err(EngineError::io(archive))?;
    let mut zip = ZipArchive::new(file)?;
    std::fs::create_dir_all(dest).map_err(EngineError::io(dest))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        if exclude.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            continue;
        }

        let relative = entry.enclosed_name().ok_or_else(|| {
            EngineError::Other(format!("Invalid zip entry path {name:?} in {archive:?}"))
        })?;
        let out = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(EngineError::io(&out))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(EngineError::io(parent))?;
        }
        let mut target = File::create(&out).map_err(EngineError::io(&out))?;
        std::io::copy(&mut entry, &mut target).map_err(EngineError::io(&out))?;
        written += 1;
    }

    debug!("Extracted {} files from {:?} into {:?}", written, archive, dest);
    Ok(written)
}

/// Async wrapper around [`unzip`].
pub async fn unzip_async(archive: &Path, dest: &Path, exclude: &[String]) -> EngineResult<usize> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let exclude = exclude.to_vec();
    tokio::task::spawn_blocking(move || unzip(&archive, &dest, &exclude))
        .await
        .map_err(|e| EngineError::Other(format!("extraction task failed: {e}")))?
}

/// Pack every file below `src` into a new zip at `dest`, entries named
/// relative to `src` with forward slashes. Overwrites `dest`.
pub fn zip_dir(src: &Path, dest: &Path) -> EngineResult<usize> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(EngineError::io(parent))?;
    }
    let out = File::create(dest).map_err(EngineError::io(dest))?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default();

    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            entries.push(entry.into_path());
        }
    }

    let mut buffer = Vec::new();
    for path in &entries {
        let name = entry_name(src, path)?;
        writer.start_file(name, options)?;
        buffer.clear();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buffer))
            .map_err(EngineError::io(path))?;
        writer.write_all(&buffer).map_err(EngineError::io(dest))?;
    }

    writer.finish()?;
    debug!("Packed {} files from {:?} into {:?}", entries.len(), src, dest);
    Ok(entries.len())
}

/// Read a single named entry into memory, if present.
pub fn read_entry(archive: &Path, name: &str) -> EngineResult<Option<Vec<u8>>> {
    let file = File::open(archive).map_err(EngineError::io(archive))?;
    let mut zip = ZipArchive::new(file)?;
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(EngineError::io(archive))?;
    Ok(Some(bytes))
}

fn entry_name(root: &Path, path: &Path) -> EngineResult<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| EngineError::Other(format!("{path:?} is not inside {root:?}")))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Recursively copy a directory tree, overwriting existing files.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> EngineResult<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| EngineError::Other(format!("{:?} is not inside {src:?}", entry.path())))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(EngineError::io(&target))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(EngineError::io(parent))?;
            }
            std::fs::copy(entry.path(), &target).map_err(EngineError::io(&target))?;
        }
    }
    Ok(())
}

/// Remove a directory if present, then recreate it empty.
pub fn reset_dir(dir: &Path) -> EngineResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(EngineError::io(dir)(e)),
    }
    std::fs::create_dir_all(dir).map_err(EngineError::io(dir))
}
