//! moorage - shared install workspaces for npm monorepos
//!
//! This crate provides the library behind `moorage generate`: it turns every
//! project's `package.json` into a temp module, synthesizes one root install
//! manifest, runs the installer against it and freezes the result into a
//! shrinkwrap file.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for moorage unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording tool runner, a recording reporter
/// and on-disk workspace fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{Configuration, PackageManifest, PinnedVersions, ProjectRecord};
pub use ops::{generate, GenerateError, GenerateOptions, GenerateSummary, InstallMode};
pub use util::context::GlobalContext;
