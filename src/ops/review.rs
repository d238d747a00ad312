//! Dependency snapshot for package review.
//!
//! Before teardown, generate records every third-party dependency the
//! workspace currently asks for, together with the review categories of the
//! projects that ask for it. Reviewers diff this file to see which packages
//! a change introduces. Entries already present in the file are kept, so
//! approvals are never dropped by a snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::config::Configuration;
use crate::core::manifest::to_manifest_json;
use crate::util::fs::write_string;

/// Category used for projects without a `review-category`.
pub const DEFAULT_REVIEW_CATEGORY: &str = "default";

/// On-disk review file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFile {
    pub dependencies: Vec<ReviewEntry>,
}

/// One reviewed dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub name: String,
    pub allowed_categories: Vec<String>,
}

impl ReviewFile {
    /// Load a review file, or an empty one if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(ReviewFile::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write the file with sorted entries.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = to_manifest_json(self).context("failed to serialize review file")?;
        write_string(path, &json).with_context(|| format!("failed to write {}", path.display()))
    }

    fn into_map(self) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in self.dependencies {
            map.entry(entry.name)
                .or_default()
                .extend(entry.allowed_categories);
        }
        map
    }

    fn from_map(map: BTreeMap<String, BTreeSet<String>>) -> Self {
        ReviewFile {
            dependencies: map
                .into_iter()
                .map(|(name, categories)| ReviewEntry {
                    name,
                    allowed_categories: categories.into_iter().collect(),
                })
                .collect(),
        }
    }
}

/// Collect the dependencies of every project, keyed by name.
///
/// Dependencies on other workspace projects are skipped.
pub fn current_dependencies(config: &Configuration) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for project in &config.projects {
        let category = project
            .review_category
            .as_deref()
            .unwrap_or(DEFAULT_REVIEW_CATEGORY);
        for name in project.manifest.installable_dependencies().into_keys() {
            if config.is_local_package(&name) {
                continue;
            }
            map.entry(name).or_default().insert(category.to_string());
        }
    }
    map
}

/// Merge the current dependencies into `path`.
///
/// Returns the number of entries in the written file.
pub fn snapshot_into(config: &Configuration, path: &Path) -> Result<usize> {
    let mut merged = ReviewFile::load(path)?.into_map();
    for (name, categories) in current_dependencies(config) {
        merged.entry(name).or_default().extend(categories);
    }

    let file = ReviewFile::from_map(merged);
    file.save(path)?;
    tracing::debug!(
        "wrote {} reviewed dependencies to {}",
        file.dependencies.len(),
        path.display()
    );
    Ok(file.dependencies.len())
}

/// Snapshot dependencies if package review is enabled.
///
/// Returns `None` when review is disabled.
pub fn snapshot_current_dependencies(config: &Configuration) -> Result<Option<usize>> {
    match &config.package_review_file {
        Some(path) => snapshot_into(config, path).map(Some),
        None => Ok(None),
    }
}
