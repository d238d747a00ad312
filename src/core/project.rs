//! Project records.
//!
//! A project is one independently versioned package of the monorepo. Generate
//! only reads projects; they are produced by the configuration loader.

use std::path::{Path, PathBuf};

use crate::core::manifest::PackageManifest;

/// One project of the workspace, as loaded from `moorage.toml` and its `package.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    /// Real npm package name (e.g. `@acme/widgets`)
    pub package_name: String,

    /// Synthetic package identity used for the temp module directory
    pub temp_alias: String,

    /// Absolute path of the project folder
    pub folder: PathBuf,

    /// Review category recorded in the package review file
    pub review_category: Option<String>,

    /// The project's parsed `package.json`
    pub manifest: PackageManifest,
}

impl ProjectRecord {
    /// Get the project folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// Strip an npm scope: `@acme/widgets` becomes `widgets`.
pub fn unscoped_name(package_name: &str) -> &str {
    match package_name.strip_prefix('@') {
        Some(scoped) => scoped.split_once('/').map_or(scoped, |(_, name)| name),
        None => package_name,
    }
}

/// The temp alias a project gets when none is configured.
pub fn default_temp_alias(prefix: &str, package_name: &str) -> String {
    format!("{}{}", prefix, unscoped_name(package_name))
}

/// Check that an alias can be used both as a directory name and an npm package name.
pub fn is_valid_temp_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}
