//! Test fixtures for common test scenarios.
//!
//! [`WorkspaceFixture`] writes a real workspace (a `moorage.toml` plus one
//! folder and `package.json` per project) into a temporary directory.
//! [`project`] builds an in-memory [`ProjectRecord`] for pure tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::config::{Configuration, CONFIG_FILE};
use crate::core::manifest::{to_manifest_json, PackageManifest, MANIFEST_FILE};
use crate::core::project::{unscoped_name, ProjectRecord};

/// Prefix used by every fixture workspace.
pub const FIXTURE_PREFIX: &str = "rush-";

/// Installer path written into every fixture workspace. The file exists but
/// is only ever run through a mock runner.
pub const FIXTURE_TOOL: &str = "tools/npm";

/// Build an in-memory project record.
pub fn project(name: &str, alias: &str, deps: &[(&str, &str)]) -> ProjectRecord {
    ProjectRecord {
        package_name: name.to_string(),
        temp_alias: alias.to_string(),
        folder: PathBuf::from("/workspace").join(unscoped_name(name)),
        review_category: None,
        manifest: manifest(name, deps),
    }
}

/// A `package.json` with the given name and dependencies.
pub fn manifest(name: &str, deps: &[(&str, &str)]) -> PackageManifest {
    PackageManifest {
        name: Some(name.to_string()),
        version: Some("1.0.0".to_string()),
        dependencies: deps
            .iter()
            .map(|(dep, range)| (dep.to_string(), range.to_string()))
            .collect(),
        ..PackageManifest::default()
    }
}

#[derive(Debug, Clone)]
struct FixtureProject {
    name: String,
    deps: Vec<(String, String)>,
}

/// Builder for an on-disk workspace.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFixture {
    projects: Vec<FixtureProject>,
    pinned: Vec<(String, String)>,
    settings: String,
    extra: String,
}

impl WorkspaceFixture {
    /// Start an empty workspace.
    pub fn new() -> Self {
        WorkspaceFixture::default()
    }

    /// Add a project. Its folder is `projects/<unscoped name>`.
    pub fn project(mut self, name: &str, deps: &[(&str, &str)]) -> Self {
        self.projects.push(FixtureProject {
            name: name.to_string(),
            deps: deps
                .iter()
                .map(|(d, r)| (d.to_string(), r.to_string()))
                .collect(),
        });
        self
    }

    /// Add a pinned version.
    pub fn pinned(mut self, name: &str, version: &str) -> Self {
        self.pinned.push((name.to_string(), version.to_string()));
        self
    }

    /// Add a raw top-level `key = value` line.
    pub fn setting(mut self, line: &str) -> Self {
        self.settings.push_str(line);
        self.settings.push('\n');
        self
    }

    /// Append raw TOML tables after the top-level keys.
    pub fn config_extra(mut self, toml: &str) -> Self {
        self.extra.push_str(toml);
        self.extra.push('\n');
        self
    }

    /// Write everything to a fresh temporary directory.
    pub fn build(self) -> BuiltWorkspace {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let mut config = String::new();
        writeln!(config, "temp-module-prefix = \"{}\"", FIXTURE_PREFIX).unwrap();
        if !self.settings.contains("purge-recycled") {
            writeln!(config, "purge-recycled = false").unwrap();
        }
        config.push_str(&self.settings);
        config.push('\n');
        if !self.extra.contains("[retry]") {
            config.push_str("[retry]\nmax-attempts = 2\ninitial-delay-ms = 1\n\n");
        }
        if !self.extra.contains("[installer]") {
            writeln!(config, "[installer]\ntool = \"{}\"\n", FIXTURE_TOOL).unwrap();
        }
        config.push_str(&self.extra);

        if !self.pinned.is_empty() {
            config.push_str("\n[pinned-versions]\n");
            for (name, version) in &self.pinned {
                writeln!(config, "\"{}\" = \"{}\"", name, version).unwrap();
            }
        }

        for project in &self.projects {
            let folder = format!("projects/{}", unscoped_name(&project.name));
            write_manifest(
                &root.join(&folder),
                &manifest(
                    &project.name,
                    &project
                        .deps
                        .iter()
                        .map(|(d, r)| (d.as_str(), r.as_str()))
                        .collect::<Vec<_>>(),
                ),
            );
            writeln!(
                config,
                "\n[[projects]]\npackage-name = \"{}\"\nfolder = \"{}\"",
                project.name, folder
            )
            .unwrap();
        }

        let tool = root.join(FIXTURE_TOOL);
        std::fs::create_dir_all(tool.parent().unwrap()).unwrap();
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();

        std::fs::write(root.join(CONFIG_FILE), config).unwrap();
        BuiltWorkspace { dir }
    }
}

/// A workspace written to disk. The directory is removed on drop.
#[derive(Debug)]
pub struct BuiltWorkspace {
    dir: TempDir,
}

impl BuiltWorkspace {
    /// Workspace root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `moorage.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.root().join(CONFIG_FILE)
    }

    /// Load the configuration.
    pub fn config(&self) -> Configuration {
        Configuration::load(&self.config_path()).unwrap()
    }

    /// Join a path relative to the root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }
}

/// Write a `package.json` into `dir`, creating it.
pub fn write_manifest(dir: &Path, manifest: &PackageManifest) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(MANIFEST_FILE), to_manifest_json(manifest).unwrap()).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_fixture_loads() {
        let fixture = WorkspaceFixture::new()
            .project("@acme/a", &[("lodash", "^4.0.0")])
            .project("b", &[])
            .pinned("typescript", "2.4.1")
            .build();

        let config = fixture.config();
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].temp_alias, "rush-a");
        assert_eq!(config.projects[0].manifest.dependencies["lodash"], "^4.0.0");
        assert_eq!(config.pinned_versions.get("typescript"), Some("2.4.1"));
        assert!(!config.purge_recycled);
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn test_project_helper() {
        let record = project("@acme/x", "rush-x", &[("react", "*")]);
        assert_eq!(record.folder(), Path::new("/workspace/x"));
        assert_eq!(record.manifest.dependencies["react"], "*");
    }
}
