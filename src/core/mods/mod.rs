mod collectors;
mod registry;
mod strategy;

pub use collectors::{finalize, stage_server_jar};
pub use registry::ModInstallStrategyRegistry;
pub use strategy::{Dest, ModContext, ModInstallStrategy};
