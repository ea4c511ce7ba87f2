pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::EngineConfig;
pub use crate::core::engine::{InstallReport, InstallRequest, PackInstaller};
pub use crate::core::error::{EngineError, EngineResult};
pub use crate::core::session::{CancelHandle, InstallSession, Side};

/// Structured logging on stderr; `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,packsmith_lib=debug")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
