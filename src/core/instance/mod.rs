mod layout;
mod record;

pub use layout::InstanceLayout;
pub use record::{InstallRecord, InstalledMod};
