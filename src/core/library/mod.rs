mod model;
mod natives;
mod replacements;
mod resolver;

pub use model::{
    DownloadInfo, ExtractSpec, LibraryDownloads, LibraryRef, Resolution, ResolvedArtifact,
    ResolvedLibrary,
};
pub use natives::extract_natives;
pub use replacements::{NativeReplacement, NativeReplacements};
pub use resolver::LibraryResolver;
