//! Temp module generation.
//!
//! Every project becomes a "temp module": a sanitized copy of its manifest,
//! renamed to the project's temp alias, that the installer can consume as an
//! ordinary `file:` dependency. Ranges are copied verbatim; two projects
//! asking for different ranges of the same package each keep their own,
//! because every temp module is installed as an isolated unit.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::manifest::{PackageManifest, MANIFEST_FILE};
use crate::core::project::{is_valid_temp_alias, ProjectRecord};
use crate::ops::errors::{GenerateError, Result};

/// Version every temp module is published under.
pub const TEMP_MODULE_VERSION: &str = "0.0.0";

/// A derived, install-ready manifest for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempModule {
    /// Real package name of the source project
    pub package_name: String,

    /// Directory and package name of the temp module
    pub alias: String,

    /// Sanitized manifest written to `<temp_modules>/<alias>/package.json`
    pub manifest: PackageManifest,
}

/// All temp modules of a workspace, keyed by real package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TempModules {
    modules: BTreeMap<String, TempModule>,
}

impl TempModules {
    /// Get the temp module of a project.
    pub fn get(&self, package_name: &str) -> Option<&TempModule> {
        self.modules.get(package_name)
    }

    /// Iterate modules in ascending alias order.
    pub fn by_alias(&self) -> Vec<&TempModule> {
        let mut modules: Vec<_> = self.modules.values().collect();
        modules.sort_by(|a, b| a.alias.cmp(&b.alias));
        modules
    }

    /// Check whether `alias` belongs to one of the modules.
    pub fn has_alias(&self, alias: &str) -> bool {
        self.modules.values().any(|m| m.alias == alias)
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if there are no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Consume into the map of real package name to module.
    pub fn into_map(self) -> BTreeMap<String, TempModule> {
        self.modules
    }
}

/// Derive a temp module for every project.
///
/// Fails with a manifest error naming the project if an alias is invalid or
/// already taken by another project.
pub fn generate_temp_modules(projects: &[ProjectRecord]) -> Result<TempModules> {
    let local: HashSet<&str> = projects.iter().map(|p| p.package_name.as_str()).collect();
    let mut aliases: HashMap<&str, &str> = HashMap::new();
    let mut modules = BTreeMap::new();

    for project in projects {
        let manifest_path = project.folder().join(MANIFEST_FILE);

        if !is_valid_temp_alias(&project.temp_alias) {
            return Err(GenerateError::manifest(
                &project.package_name,
                manifest_path,
                format!("temp alias `{}` is not filesystem safe", project.temp_alias),
            ));
        }
        if let Some(owner) = aliases.insert(&project.temp_alias, &project.package_name) {
            return Err(GenerateError::manifest(
                &project.package_name,
                manifest_path,
                format!(
                    "temp alias `{}` is already used by project `{}`",
                    project.temp_alias, owner
                ),
            ));
        }
        if modules.contains_key(&project.package_name) {
            return Err(GenerateError::manifest(
                &project.package_name,
                manifest_path,
                "package name is used by more than one project",
            ));
        }

        let module = TempModule {
            package_name: project.package_name.clone(),
            alias: project.temp_alias.clone(),
            manifest: sanitize(project, &local),
        };
        modules.insert(project.package_name.clone(), module);
    }

    tracing::debug!("derived {} temp modules", modules.len());
    Ok(TempModules { modules })
}

fn sanitize(project: &ProjectRecord, local: &HashSet<&str>) -> PackageManifest {
    let mut dependencies = project.manifest.installable_dependencies();
    // Workspace projects are linked, never installed from the registry
    dependencies.retain(|name, _| !local.contains(name.as_str()));

    PackageManifest {
        name: Some(project.temp_alias.clone()),
        version: Some(TEMP_MODULE_VERSION.to_string()),
        description: Some(format!("Temp module for {}", project.package_name)),
        private: true,
        dependencies,
        ..PackageManifest::default()
    }
}
