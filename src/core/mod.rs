// ─── Packsmith Core ───
// Modpack installation and dependency resolution engine.
//
// Architecture:
//   core/
//     config, platform, rules, hashing, maven  — shared primitives
//     library/    — Library resolution, native replacements, natives
//     downloader/ — Concurrent verified downloads (direct, staged, browser)
//     manifest/   — Pack version model + optional mod selection
//     mods/       — Per-kind placement strategies + archive collectors
//     actions     — Post-install archive/rename steps
//     loaders/    — Installer profiles + processor chain
//     assets/     — Asset index + content-addressed objects
//     instance/   — On-disk layout + install record
//     engine      — Install orchestration for one session

pub mod actions;
pub mod archive;
pub mod assets;
pub mod config;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod http;
pub mod instance;
pub mod library;
pub mod loaders;
pub mod manifest;
pub mod maven;
pub mod mods;
pub mod platform;
pub mod rules;
pub mod session;
