//! High-level operations.
//!
//! This module contains the implementation of `moorage generate` and the
//! components it sequences.

pub mod errors;
pub mod events;
pub mod generate;
pub mod installer;
pub mod review;
pub mod synthesize;
pub mod temp_modules;
pub mod transition;

pub use errors::{GenerateError, Result};
pub use events::{GenerateEvent, Reporter, ShellReporter, Stage};
pub use generate::{generate, GenerateOptions, GenerateSummary};
pub use installer::{ensure_installer_available, install_and_freeze, InstallMode};
pub use review::snapshot_current_dependencies;
pub use synthesize::{build_root_manifest, RootManifest, RootManifestBuilder};
pub use temp_modules::{generate_temp_modules, TempModule, TempModules};
pub use transition::{FsTransition, TransitionState};
