mod model;
mod selection;

pub use model::{
    ActionAfter, ActionKind, ActionRef, ArchiveKind, AssetIndexRef, DecompType, DownloadType,
    ExtractTo, FileCheck, GameDownloads, GameJar, LoaderKind, LoaderSpec, ModKind, ModRef,
    PackVersion,
};
pub use selection::select_mods;
