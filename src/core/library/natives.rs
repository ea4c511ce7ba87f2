use std::path::Path;

use tracing::debug;

use super::model::{ExtractSpec, ResolvedArtifact};
use crate::core::archive;
use crate::core::error::EngineResult;

const DEFAULT_EXCLUDE: &str = "META-INF/";

/// Unpack a downloaded natives jar into the instance natives directory.
pub fn extract_natives(
    natives: &ResolvedArtifact,
    extract: Option<&ExtractSpec>,
    libs_dir: &Path,
    natives_dir: &Path,
) -> EngineResult<usize> {
    let exclude = match extract {
        Some(spec) if !spec.exclude.is_empty() => spec.exclude.clone(),
        _ => vec![DEFAULT_EXCLUDE.to_string()],
    };
    let jar = natives.path_in(libs_dir);
    debug!("Extracting natives {} into {:?}", natives.identifier, natives_dir);
    archive::unzip(&jar, natives_dir, &exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::test_support::write_zip;
    use std::path::PathBuf;

    #[test]
    fn skips_manifest_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let libs = dir.path().join("libraries");
        let natives = ResolvedArtifact {
            identifier: "org.lwjgl:lwjgl:3.3.1:natives-linux".into(),
            local_path: PathBuf::from("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar"),
            remote_url: None,
            hash: None,
            size: None,
            replaced: false,
        };
        write_zip(
            &natives.path_in(&libs),
            &[("META-INF/MANIFEST.MF", b"x"), ("liblwjgl.so", b"elf")],
        );

        let out = dir.path().join("bin/natives");
        assert_eq!(extract_natives(&natives, None, &libs, &out).unwrap(), 1);
        assert!(out.join("liblwjgl.so").is_file());
    }
}
