mod asset_index;

pub use asset_index::{download_assets, AssetIndex, AssetObject, AssetReport, RESOURCES_URL};
