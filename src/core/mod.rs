//! Core data structures for moorage.
//!
//! - Project manifests (`package.json`)
//! - Project records and temp aliases
//! - The pinned-version table
//! - Workspace configuration (`moorage.toml`)

pub mod config;
pub mod manifest;
pub mod pinned;
pub mod project;

pub use config::{Configuration, InstallerConfig, CONFIG_FILE};
pub use manifest::PackageManifest;
pub use pinned::PinnedVersions;
pub use project::ProjectRecord;
