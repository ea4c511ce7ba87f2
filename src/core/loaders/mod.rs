mod installer;
pub mod processor;
mod profile;

pub use installer::{LoaderInstallResult, LoaderInstallState, LoaderInstaller};
pub use processor::{
    ProcessInvocation, ProcessOutput, ProcessRunner, ProcessorPaths, SubprocessRunner,
};
pub use profile::{parse_profile, BundledLibrary, DataEntry, LoaderInstallProfile, ProcessorSpec};
