//! `package.json` manifest model.
//!
//! Every project in the workspace carries an npm-style `package.json`. Only the
//! fields that generate reads or writes are typed; anything else is carried in
//! `other` so that a manifest can be loaded and re-serialized without loss.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// File name of every project manifest, temp module and the root install manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// A parsed `package.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub private: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: BTreeMap<String, String>,

    // Unstructured fields kept for round trip capabilities
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Parse manifest content.
    pub fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Every installable dependency of this manifest, merged into one map.
    ///
    /// Optional and dev dependencies are layered under regular dependencies, so
    /// a name listed in more than one section keeps its `dependencies` range.
    pub fn installable_dependencies(&self) -> BTreeMap<String, String> {
        let mut merged = self.optional_dependencies.clone();
        merged.extend(
            self.dev_dependencies
                .iter()
                .map(|(name, range)| (name.clone(), range.clone())),
        );
        merged.extend(
            self.dependencies
                .iter()
                .map(|(name, range)| (name.clone(), range.clone())),
        );
        merged
    }

    /// Parse the `version` field as semver, if present.
    pub fn semver(&self) -> Option<Result<semver::Version, semver::Error>> {
        self.version.as_deref().map(semver::Version::parse)
    }
}

/// Serialize a manifest the way npm writes it: two-space indent, trailing newline.
pub fn to_manifest_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}
