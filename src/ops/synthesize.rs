//! Root install manifest synthesis.
//!
//! The root install manifest is the single `package.json` the installer runs
//! against. Its dependencies are every pinned version, in configuration order,
//! followed by one `file:` reference per temp module in ascending alias order.
//! Serialization is deterministic: the same inputs always give the same bytes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::config::Configuration;
use crate::core::manifest::to_manifest_json;
use crate::core::pinned::PinnedVersions;
use crate::ops::errors::{GenerateError, Result};
use crate::ops::temp_modules::TempModules;
use crate::util::fs::relative_unix_path;

/// Package name of the synthesized root manifest.
pub const ROOT_PACKAGE_NAME: &str = "moorage-common";

/// Placeholder version of the root manifest.
pub const ROOT_PACKAGE_VERSION: &str = "0.0.0";

/// Description telling readers where the file came from.
pub const ROOT_PACKAGE_DESCRIPTION: &str =
    "Temporary file generated by moorage generate; do not edit";

/// The synthesized `<common>/package.json`.
///
/// Field order here is the key order on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootManifest {
    pub name: String,
    pub version: String,
    pub private: bool,
    pub description: String,
    pub dependencies: IndexMap<String, String>,
}

impl RootManifest {
    /// Serialize to the exact bytes written to disk.
    pub fn to_json(&self) -> Result<String> {
        to_manifest_json(self).map_err(|e| {
            GenerateError::configuration(format!("failed to serialize root manifest: {}", e))
        })
    }
}

/// Incrementally assembles a [`RootManifest`].
///
/// Pins are inserted on construction, so a temp module reference that would
/// overwrite a pinned name is detected when it is added.
#[derive(Debug, Clone)]
pub struct RootManifestBuilder {
    temp_modules_ref: String,
    dependencies: IndexMap<String, String>,
}

impl RootManifestBuilder {
    /// Start a manifest holding every pin.
    ///
    /// `temp_modules_ref` is the temp modules folder relative to the common
    /// folder, with `/` separators (usually `temp_modules`).
    pub fn new(pinned: &PinnedVersions, temp_modules_ref: impl Into<String>) -> Self {
        let dependencies = pinned
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect();

        RootManifestBuilder {
            temp_modules_ref: temp_modules_ref.into(),
            dependencies,
        }
    }

    /// Start a manifest for a loaded configuration.
    pub fn for_config(config: &Configuration) -> Self {
        let temp_modules_ref =
            relative_unix_path(&config.common_folder, &config.temp_modules_folder);
        RootManifestBuilder::new(&config.pinned_versions, temp_modules_ref)
    }

    /// The `file:` specifier that points at a temp module.
    pub fn file_reference(&self, alias: &str) -> String {
        let folder = self.temp_modules_ref.trim_end_matches('/');
        if folder.is_empty() {
            format!("file:./{}", alias)
        } else if folder.starts_with("./") || folder.starts_with("../") || folder.starts_with('/')
        {
            format!("file:{}/{}", folder, alias)
        } else {
            format!("file:./{}/{}", folder, alias)
        }
    }

    /// Register a temp module as a local-file dependency.
    pub fn add_temp_module(&mut self, alias: &str) -> Result<()> {
        if let Some(existing) = self.dependencies.get(alias) {
            return Err(GenerateError::configuration(format!(
                "temp module `{}` would overwrite the root dependency `{}@{}`",
                alias, alias, existing
            )));
        }
        let reference = self.file_reference(alias);
        self.dependencies.insert(alias.to_string(), reference);
        Ok(())
    }

    /// Finish with the fixed metadata.
    pub fn finish(self) -> RootManifest {
        RootManifest {
            name: ROOT_PACKAGE_NAME.to_string(),
            version: ROOT_PACKAGE_VERSION.to_string(),
            private: true,
            description: ROOT_PACKAGE_DESCRIPTION.to_string(),
            dependencies: self.dependencies,
        }
    }
}

/// Build the root install manifest in one step.
///
/// Pure: modules are taken in ascending alias order regardless of project order.
pub fn build_root_manifest(
    pinned: &PinnedVersions,
    modules: &TempModules,
    temp_modules_ref: &str,
) -> Result<RootManifest> {
    let mut builder = RootManifestBuilder::new(pinned, temp_modules_ref);
    for module in modules.by_alias() {
        builder.add_temp_module(&module.alias)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::temp_modules::generate_temp_modules;
    use crate::test_support::project;

    fn modules(aliases: &[&str]) -> TempModules {
        let projects: Vec<_> = aliases
            .iter()
            .map(|alias| project(&format!("@acme/{}", alias), alias, &[]))
            .collect();
        generate_temp_modules(&projects).unwrap()
    }

    #[test]
    fn test_pins_first_then_sorted_aliases() {
        let pinned = PinnedVersions::from_pairs([("webpack", "~3.0.0"), ("@types/node", "8.0.0")])
            .unwrap();
        let root =
            build_root_manifest(&pinned, &modules(&["rush-zed", "rush-alpha"]), "temp_modules")
                .unwrap();

        let entries: Vec<_> = root
            .dependencies
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![
                ("webpack", "~3.0.0"),
                ("@types/node", "8.0.0"),
                ("rush-alpha", "file:./temp_modules/rush-alpha"),
                ("rush-zed", "file:./temp_modules/rush-zed"),
            ]
        );
        assert_eq!(root.name, ROOT_PACKAGE_NAME);
        assert!(root.private);
    }

    #[test]
    fn test_output_is_byte_identical() {
        let pinned = PinnedVersions::from_pairs([("typescript", "2.4.1")]).unwrap();
        let forward = modules(&["rush-a", "rush-b", "rush-c"]);
        let backward = modules(&["rush-c", "rush-b", "rush-a"]);

        let first = build_root_manifest(&pinned, &forward, "temp_modules")
            .unwrap()
            .to_json()
            .unwrap();
        let second = build_root_manifest(&pinned, &backward, "temp_modules")
            .unwrap()
            .to_json()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_order_on_disk() {
        let root =
            build_root_manifest(&PinnedVersions::new(), &modules(&["rush-a"]), "temp_modules")
                .unwrap();
        let json = root.to_json().unwrap();

        let keys = [
            "\"name\"",
            "\"version\"",
            "\"private\"",
            "\"description\"",
            "\"dependencies\"",
        ];
        let positions: Vec<_> = keys
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert!(json.ends_with("}\n"));
    }

    #[test]
    fn test_temp_module_cannot_overwrite_pin() {
        let pinned = PinnedVersions::from_pairs([("rush-a", "1.0.0")]).unwrap();
        let err = build_root_manifest(&pinned, &modules(&["rush-a"]), "temp_modules").unwrap_err();

        assert!(matches!(err, GenerateError::Configuration { .. }));
    }

    #[test]
    fn test_file_reference_forms() {
        let pinned = PinnedVersions::new();
        assert_eq!(
            RootManifestBuilder::new(&pinned, "temp_modules").file_reference("x"),
            "file:./temp_modules/x"
        );
        assert_eq!(
            RootManifestBuilder::new(&pinned, "../build/tm").file_reference("x"),
            "file:../build/tm/x"
        );
        assert_eq!(
            RootManifestBuilder::new(&pinned, "").file_reference("x"),
            "file:./x"
        );
    }
}
