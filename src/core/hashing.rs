// ─── Artifact Verification ───
// Content hashing and "is the local copy still good?" checks.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::debug;

use crate::core::error::{EngineError, EngineResult};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Guess the algorithm from the length of a hex digest.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(HashAlgorithm::Md5),
            40 => Some(HashAlgorithm::Sha1),
            64 => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("md5"),
            HashAlgorithm::Sha1 => f.write_str("sha1"),
            HashAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

/// A hex digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedHash {
    pub algorithm: HashAlgorithm,
    pub hex: String,
}

impl ExpectedHash {
    pub fn md5(hex: impl Into<String>) -> Self {
        Self {
            algorithm: HashAlgorithm::Md5,
            hex: hex.into(),
        }
    }

    pub fn sha1(hex: impl Into<String>) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha1,
            hex: hex.into(),
        }
    }

    /// Build from a bare hex string, inferring the algorithm from its length.
    pub fn infer(hex: &str) -> Option<Self> {
        let trimmed = hex.trim();
        HashAlgorithm::from_hex_len(trimmed.len()).map(|algorithm| Self {
            algorithm,
            hex: trimmed.to_string(),
        })
    }

    /// Case-insensitive comparison against a computed digest.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for ExpectedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

enum AnyHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl AnyHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => AnyHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => AnyHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => AnyHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            AnyHasher::Md5(h) => h.update(data),
            AnyHasher::Sha1(h) => h.update(data),
            AnyHasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            AnyHasher::Md5(h) => hex::encode(h.finalize()),
            AnyHasher::Sha1(h) => hex::encode(h.finalize()),
            AnyHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hash an in-memory buffer.
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = AnyHasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Hash a file in fixed-size chunks without loading it whole.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> EngineResult<String> {
    let file = File::open(path).map_err(EngineError::io(path))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = AnyHasher::new(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buffer).map_err(EngineError::io(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize_hex())
}

/// Async wrapper so hashing large jars never blocks the runtime.
pub async fn hash_file_async(algorithm: HashAlgorithm, path: &Path) -> EngineResult<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file(algorithm, &path))
        .await
        .map_err(|e| EngineError::Other(format!("hashing task failed: {e}")))?
}

/// Decide whether `path` must be (re)fetched.
///
/// Size is a cheap pre-filter when known; the hash, when known, is decisive.
/// With neither, any non-empty existing file is trusted.
pub fn needs_download(
    expected_hash: Option<&ExpectedHash>,
    expected_size: Option<u64>,
    path: &Path,
) -> EngineResult<bool> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(EngineError::io(path)(e)),
    };

    if let Some(size) = expected_size {
        if metadata.len() != size {
            debug!(
                "Size mismatch for {:?}: expected {}, found {}",
                path,
                size,
                metadata.len()
            );
            return Ok(true);
        }
    }

    match expected_hash {
        Some(expected) => {
            let actual = hash_file(expected.algorithm, path)?;
            if !expected.matches(&actual) {
                debug!("Hash mismatch for {:?}: expected {}, got {}", path, expected, actual);
                return Ok(true);
            }
            Ok(false)
        }
        None => Ok(expected_size.is_none() && metadata.len() == 0),
    }
}

/// Async counterpart of [`needs_download`].
pub async fn needs_download_async(
    expected_hash: Option<&ExpectedHash>,
    expected_size: Option<u64>,
    path: &Path,
) -> EngineResult<bool> {
    let expected_hash = expected_hash.cloned();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || needs_download(expected_hash.as_ref(), expected_size, &path))
        .await
        .map_err(|e| EngineError::Other(format!("verification task failed: {e}")))?
}

/// Verify a file, returning a descriptive error instead of a bool.
pub fn verify_file(
    expected_hash: Option<&ExpectedHash>,
    expected_size: Option<u64>,
    path: &Path,
) -> EngineResult<()> {
    if let Some(size) = expected_size {
        let actual = std::fs::metadata(path).map_err(EngineError::io(path))?.len();
        if actual != size {
            return Err(EngineError::SizeMismatch {
                path: path.to_path_buf(),
                expected: size,
                actual,
            });
        }
    }

    if let Some(expected) = expected_hash {
        let actual = hash_file(expected.algorithm, path)?;
        if !expected.matches(&actual) {
            return Err(EngineError::HashMismatch {
                path: path.to_path_buf(),
                expected: expected.hex.clone(),
                actual,
            });
        }
    }

    Ok(())
}

pub async fn verify_file_async(
    expected_hash: Option<&ExpectedHash>,
    expected_size: Option<u64>,
    path: &Path,
) -> EngineResult<()> {
    let expected_hash = expected_hash.cloned();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || verify_file(expected_hash.as_ref(), expected_size, &path))
        .await
        .map_err(|e| EngineError::Other(format!("verification task failed: {e}")))?
}

/// Content-addressed storage: objects live at `<root>/<hash[0:2]>/<hash>`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    algorithm: HashAlgorithm,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            algorithm: HashAlgorithm::Sha1,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative layout of an object (`ab/abcdef...`).
    pub fn relative_path(hash: &str) -> PathBuf {
        let hash = hash.to_ascii_lowercase();
        let prefix = hash.get(..2).unwrap_or(&hash).to_string();
        PathBuf::from(prefix).join(hash)
    }

    pub fn object_path(&self, hash: &str) -> PathBuf {
        self.root.join(Self::relative_path(hash))
    }

    /// Whether a verified copy of `hash` is present.
    pub fn contains(&self, hash: &str) -> EngineResult<bool> {
        let expected = ExpectedHash {
            algorithm: self.algorithm,
            hex: hash.to_string(),
        };
        Ok(!needs_download(Some(&expected), None, &self.object_path(hash))?)
    }

    /// Store a buffer under its own hash and return that hash.
    ///
    /// Written to a temporary name first so readers never see a partial object.
    #[cfg(test)]
    pub(crate) fn put_bytes(&self, bytes: &[u8]) -> EngineResult<String> {
        let hash = hash_bytes(self.algorithm, bytes);
        let dest = self.object_path(&hash);
        if dest.is_file() {
            return Ok(hash);
        }

        let parent = dest
            .parent()
            .ok_or_else(|| EngineError::Other(format!("object path {:?} has no parent", dest)))?;
        std::fs::create_dir_all(parent).map_err(EngineError::io(parent))?;

        let tmp = parent.join(format!(".{}.{}", hash, uuid::Uuid::new_v4()));
        std::fs::write(&tmp, bytes).map_err(EngineError::io(&tmp))?;
        std::fs::rename(&tmp, &dest).map_err(EngineError::io(&dest))?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    #[test]
    fn hashes_known_vectors() {
        assert_eq!(hash_bytes(HashAlgorithm::Sha1, b"hello"), HELLO_SHA1);
        assert_eq!(hash_bytes(HashAlgorithm::Md5, b"hello"), HELLO_MD5);
    }

    #[test]
    fn file_hash_matches_buffer_hash_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(
            hash_file(HashAlgorithm::Sha1, &path).unwrap(),
            hash_bytes(HashAlgorithm::Sha1, &data)
        );
    }

    #[test]
    fn missing_file_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jar");
        assert!(needs_download(None, None, &path).unwrap());
    }

    #[test]
    fn matching_file_is_fresh_and_stays_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let expected = ExpectedHash::sha1(HELLO_SHA1.to_uppercase());
        assert!(!needs_download(Some(&expected), Some(5), &path).unwrap());
        assert!(!needs_download(Some(&expected), Some(5), &path).unwrap());
    }

    #[test]
    fn size_or_hash_mismatch_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let expected = ExpectedHash::md5(HELLO_MD5);
        assert!(needs_download(Some(&expected), Some(6), &path).unwrap());

        let wrong = ExpectedHash::md5("00000000000000000000000000000000");
        assert!(needs_download(Some(&wrong), None, &path).unwrap());
    }

    #[test]
    fn unhashed_empty_file_needs_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert!(needs_download(None, None, &path).unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(!needs_download(None, None, &path).unwrap());
    }

    #[test]
    fn infer_picks_algorithm_by_length() {
        assert_eq!(
            ExpectedHash::infer(HELLO_MD5).unwrap().algorithm,
            HashAlgorithm::Md5
        );
        assert_eq!(
            ExpectedHash::infer(HELLO_SHA1).unwrap().algorithm,
            HashAlgorithm::Sha1
        );
        assert!(ExpectedHash::infer("abc").is_none());
    }

    #[test]
    fn verify_file_reports_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        let err = verify_file(Some(&ExpectedHash::sha1("ff")), None, &path).unwrap_err();
        assert!(matches!(err, EngineError::HashMismatch { .. }));
    }

    #[test]
    fn object_store_uses_prefix_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let hash = store.put_bytes(b"hello").unwrap();

        assert_eq!(hash, HELLO_SHA1);
        let expected = dir.path().join("aa").join(HELLO_SHA1);
        assert_eq!(store.object_path(&hash), expected);
        assert!(expected.is_file());
        assert!(store.contains(&hash).unwrap());
        // Second put is a no-op.
        assert_eq!(store.put_bytes(b"hello").unwrap(), hash);
    }
}
