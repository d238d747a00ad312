//! Workspace configuration (`moorage.toml`).
//!
//! The configuration file sits at the repository root and lists every project
//! together with the shared settings generate needs:
//!
//! ```toml
//! common-folder = "common"
//! temp-module-prefix = "moorage-"
//!
//! [installer]
//! tool = "npm"
//! cache-folder = "common/npm-cache"
//!
//! [pinned-versions]
//! typescript = "~2.4.1"
//!
//! [[projects]]
//! package-name = "@acme/widgets"
//! folder = "libs/widgets"
//! ```
//!
//! Loading produces a [`Configuration`] value which is passed explicitly to
//! every generate component. Relative paths are resolved against the
//! directory that contains `moorage.toml`.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::manifest::{PackageManifest, MANIFEST_FILE};
use crate::core::pinned::PinnedVersions;
use crate::core::project::{default_temp_alias, is_valid_temp_alias, ProjectRecord};
use crate::ops::errors::{GenerateError, Result};
use crate::util::fs::{normalize_path, RetryPolicy};

/// Name of the workspace configuration file.
pub const CONFIG_FILE: &str = "moorage.toml";

/// Shared install directory inside the common folder.
pub const NODE_MODULES: &str = "node_modules";

/// Lock artifact written by the installer's freeze step.
pub const SHRINKWRAP_FILE: &str = "npm-shrinkwrap.json";

/// Directory inside the common folder that recycled directories are moved to.
pub const RECYCLER_DIR: &str = ".recycler";

const DEFAULT_COMMON_FOLDER: &str = "common";
const DEFAULT_TEMP_MODULES_DIR: &str = "temp_modules";
const DEFAULT_TEMP_MODULE_PREFIX: &str = "moorage-";
const DEFAULT_REVIEW_FILE: &str = "common/config/PackageDependencies.json";

/// Loaded workspace configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Directory containing `moorage.toml`
    pub root: PathBuf,

    /// Folder holding the root install manifest, `node_modules` and the shrinkwrap
    pub common_folder: PathBuf,

    /// Folder the temp modules are written to
    pub temp_modules_folder: PathBuf,

    /// Name prefix shared by every temp alias
    pub temp_module_prefix: String,

    /// Delete recycled directories in a background process
    pub purge_recycled: bool,

    /// External installer settings
    pub installer: InstallerConfig,

    /// Retry policy for creating the temp modules folder
    pub retry: RetryPolicy,

    /// Review file to snapshot dependencies into, when package review is enabled
    pub package_review_file: Option<PathBuf>,

    /// Versions that override every project's requested range
    pub pinned_versions: PinnedVersions,

    /// All projects, in configuration order
    pub projects: Vec<ProjectRecord>,
}

/// External installer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Tool name looked up on PATH, or a path to it
    pub tool: String,

    /// Directory passed as `--cache`
    pub cache_folder: Option<PathBuf>,

    /// Directory passed as `--tmp`
    pub tmp_folder: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_common_folder")]
    common_folder: PathBuf,

    #[serde(default)]
    temp_modules_folder: Option<PathBuf>,

    #[serde(default = "default_temp_module_prefix")]
    temp_module_prefix: String,

    #[serde(default = "default_true")]
    purge_recycled: bool,

    #[serde(default)]
    installer: RawInstaller,

    #[serde(default)]
    retry: RawRetry,

    #[serde(default)]
    package_review: RawPackageReview,

    #[serde(default)]
    pinned_versions: PinnedVersions,

    #[serde(default)]
    projects: Vec<RawProject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawInstaller {
    #[serde(default = "default_tool")]
    tool: String,

    #[serde(default)]
    cache_folder: Option<PathBuf>,

    #[serde(default)]
    tmp_folder: Option<PathBuf>,
}

impl Default for RawInstaller {
    fn default() -> Self {
        RawInstaller {
            tool: default_tool(),
            cache_folder: None,
            tmp_folder: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawRetry {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    initial_delay_ms: u64,
}

impl Default for RawRetry {
    fn default() -> Self {
        RawRetry {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawPackageReview {
    #[serde(default)]
    enabled: bool,

    #[serde(default)]
    file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawProject {
    package_name: String,
    folder: PathBuf,

    #[serde(default)]
    temp_alias: Option<String>,

    #[serde(default)]
    review_category: Option<String>,
}

fn default_common_folder() -> PathBuf {
    PathBuf::from(DEFAULT_COMMON_FOLDER)
}

fn default_temp_module_prefix() -> String {
    DEFAULT_TEMP_MODULE_PREFIX.to_string()
}

fn default_tool() -> String {
    "npm".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_initial_delay_ms() -> u64 {
    RetryPolicy::default().initial_delay.as_millis() as u64
}

impl Configuration {
    /// Load the configuration file and every project manifest it lists.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GenerateError::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&contents, path)
    }

    /// Parse configuration content. `path` locates the workspace root.
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).map_err(|e| {
            GenerateError::configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        if raw.temp_module_prefix.is_empty() {
            return Err(GenerateError::configuration(
                "`temp-module-prefix` cannot be empty",
            ));
        }
        if raw.retry.max_attempts == 0 {
            return Err(GenerateError::configuration(
                "`retry.max-attempts` must be at least 1",
            ));
        }
        if raw.projects.is_empty() {
            return Err(GenerateError::configuration(format!(
                "{} does not list any [[projects]]",
                path.display()
            )));
        }

        let common_folder = root.join(&raw.common_folder);
        let temp_modules_folder = match &raw.temp_modules_folder {
            Some(folder) => root.join(folder),
            None => common_folder.join(DEFAULT_TEMP_MODULES_DIR),
        };

        let package_review_file = raw.package_review.enabled.then(|| {
            root.join(
                raw.package_review
                    .file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REVIEW_FILE)),
            )
        });

        let mut seen = HashSet::new();
        let mut projects = Vec::with_capacity(raw.projects.len());
        for raw_project in raw.projects {
            if !seen.insert(raw_project.package_name.clone()) {
                return Err(GenerateError::configuration(format!(
                    "project `{}` is listed more than once",
                    raw_project.package_name
                )));
            }
            let project = load_project(&root, &raw.temp_module_prefix, raw_project)?;
            if raw.pinned_versions.contains(&project.temp_alias) {
                return Err(GenerateError::configuration(format!(
                    "temp alias `{}` of project `{}` collides with a pinned dependency name",
                    project.temp_alias, project.package_name
                )));
            }
            projects.push(project);
        }

        check_temp_modules_folder(&temp_modules_folder, &root, path, &common_folder, &projects)?;

        let installer = InstallerConfig {
            tool: raw.installer.tool,
            cache_folder: raw.installer.cache_folder.map(|p| root.join(p)),
            tmp_folder: raw.installer.tmp_folder.map(|p| root.join(p)),
        };

        Ok(Configuration {
            root,
            common_folder,
            temp_modules_folder,
            temp_module_prefix: raw.temp_module_prefix,
            purge_recycled: raw.purge_recycled,
            installer,
            retry: RetryPolicy::new(
                raw.retry.max_attempts,
                Duration::from_millis(raw.retry.initial_delay_ms),
            ),
            package_review_file,
            pinned_versions: raw.pinned_versions,
            projects,
        })
    }

    /// Get the shared install directory (`<common>/node_modules`).
    pub fn install_dir(&self) -> PathBuf {
        self.common_folder.join(NODE_MODULES)
    }

    /// Get the lock artifact path (`<common>/npm-shrinkwrap.json`).
    pub fn lockfile_path(&self) -> PathBuf {
        self.common_folder.join(SHRINKWRAP_FILE)
    }

    /// Get the root install manifest path (`<common>/package.json`).
    pub fn root_manifest_path(&self) -> PathBuf {
        self.common_folder.join(MANIFEST_FILE)
    }

    /// Get the recycler directory.
    pub fn recycler_dir(&self) -> PathBuf {
        self.common_folder.join(RECYCLER_DIR)
    }

    /// Get the directory of one temp module.
    pub fn temp_module_dir(&self, alias: &str) -> PathBuf {
        self.temp_modules_folder.join(alias)
    }

    /// Check whether a package name belongs to a workspace project.
    pub fn is_local_package(&self, name: &str) -> bool {
        self.projects.iter().any(|p| p.package_name == name)
    }
}

/// The temp modules folder is deleted wholesale on every run, so it must be a
/// dedicated folder inside the workspace that holds nothing else moorage or
/// the user owns.
fn check_temp_modules_folder(
    folder: &Path,
    root: &Path,
    config_file: &Path,
    common_folder: &Path,
    projects: &[ProjectRecord],
) -> Result<()> {
    let folder = normalize_path(folder);
    let root = normalize_path(root);

    let inside_root = folder
        .strip_prefix(&root)
        .map(|rel| {
            rel.components().next().is_some()
                && rel.components().all(|c| matches!(c, Component::Normal(_)))
        })
        .unwrap_or(false);
    if !inside_root {
        return Err(GenerateError::configuration(format!(
            "`temp-modules-folder` ({}) must be a folder inside the workspace root",
            folder.display()
        )));
    }

    let common_folder = normalize_path(common_folder);
    let mut protected = vec![
        ("the configuration file".to_string(), normalize_path(config_file)),
        ("the common folder".to_string(), common_folder.clone()),
    ];
    protected.extend(projects.iter().map(|p| {
        (format!("project `{}`", p.package_name), normalize_path(&p.folder))
    }));

    let install_dir = common_folder.join(NODE_MODULES);
    if folder.starts_with(&install_dir) {
        return Err(GenerateError::configuration(format!(
            "`temp-modules-folder` ({}) cannot live inside {}",
            folder.display(),
            install_dir.display()
        )));
    }

    match protected.iter().find(|(_, path)| path.starts_with(&folder)) {
        Some((what, _)) => Err(GenerateError::configuration(format!(
            "`temp-modules-folder` ({}) would delete {} on every run",
            folder.display(),
            what
        ))),
        None => Ok(()),
    }
}

fn load_project(root: &Path, prefix: &str, raw: RawProject) -> Result<ProjectRecord> {
    let folder = root.join(&raw.folder);
    let manifest_path = folder.join(MANIFEST_FILE);

    let contents = std::fs::read_to_string(&manifest_path).map_err(|e| {
        GenerateError::manifest(&raw.package_name, &manifest_path, format!("failed to read: {}", e))
    })?;
    let manifest = PackageManifest::parse(&contents).map_err(|e| {
        GenerateError::manifest(&raw.package_name, &manifest_path, format!("malformed JSON: {}", e))
    })?;

    match manifest.name.as_deref() {
        Some(name) if name == raw.package_name => {}
        Some(name) => {
            return Err(GenerateError::manifest(
                &raw.package_name,
                &manifest_path,
                format!("package name `{}` does not match moorage.toml", name),
            ))
        }
        None => {
            return Err(GenerateError::manifest(
                &raw.package_name,
                &manifest_path,
                "missing `name` field",
            ))
        }
    }

    if let Some(Err(e)) = manifest.semver() {
        return Err(GenerateError::manifest(
            &raw.package_name,
            &manifest_path,
            format!("invalid version: {}", e),
        ));
    }

    let temp_alias = raw
        .temp_alias
        .unwrap_or_else(|| default_temp_alias(prefix, &raw.package_name));
    if !is_valid_temp_alias(&temp_alias) {
        return Err(GenerateError::manifest(
            &raw.package_name,
            &manifest_path,
            format!("temp alias `{}` is not a valid directory and package name", temp_alias),
        ));
    }
    if !temp_alias.starts_with(prefix) {
        tracing::warn!(
            "temp alias `{}` does not start with `{}`; lazy generate will not clean it up",
            temp_alias,
            prefix
        );
    }

    Ok(ProjectRecord {
        package_name: raw.package_name,
        temp_alias,
        folder,
        review_category: raw.review_category,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_project(root: &Path, folder: &str, manifest: &str) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    fn write_config(root: &Path, contents: &str) -> PathBuf {
        let path = root.join(CONFIG_FILE);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_configuration() {
        let tmp = TempDir::new().unwrap();
        write_project(
            tmp.path(),
            "libs/widgets",
            r#"{ "name": "@acme/widgets", "version": "1.0.0" }"#,
        );
        write_project(tmp.path(), "apps/site", r#"{ "name": "site", "version": "0.1.0" }"#);
        let path = write_config(
            tmp.path(),
            r#"
common-folder = "common"
temp-module-prefix = "rush-"

[installer]
tool = "npm"
cache-folder = "common/npm-cache"

[retry]
max-attempts = 3
initial-delay-ms = 5

[package-review]
enabled = true

[pinned-versions]
typescript = "~2.4.1"
"@types/node" = "8.0.0"

[[projects]]
package-name = "@acme/widgets"
folder = "libs/widgets"
review-category = "libraries"

[[projects]]
package-name = "site"
folder = "apps/site"
temp-alias = "rush-website"
"#,
        );

        let config = Configuration::load(&path).unwrap();

        assert_eq!(config.common_folder, tmp.path().join("common"));
        assert_eq!(config.temp_modules_folder, tmp.path().join("common/temp_modules"));
        assert_eq!(config.install_dir(), tmp.path().join("common/node_modules"));
        assert_eq!(config.lockfile_path(), tmp.path().join("common/npm-shrinkwrap.json"));
        assert_eq!(
            config.installer.cache_folder,
            Some(tmp.path().join("common/npm-cache"))
        );
        assert_eq!(config.installer.tmp_folder, None);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(5));
        assert_eq!(
            config.package_review_file,
            Some(tmp.path().join(DEFAULT_REVIEW_FILE))
        );

        let pins: Vec<_> = config.pinned_versions.iter().map(|(n, _)| n).collect();
        assert_eq!(pins, vec!["typescript", "@types/node"]);

        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].temp_alias, "rush-widgets");
        assert_eq!(config.projects[0].review_category.as_deref(), Some("libraries"));
        assert_eq!(config.projects[1].temp_alias, "rush-website");
        assert!(config.is_local_package("site"));
        assert!(!config.is_local_package("lodash"));
    }

    #[test]
    fn test_defaults() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a" }"#);
        let path = write_config(
            tmp.path(),
            "[[projects]]\npackage-name = \"a\"\nfolder = \"a\"\n",
        );

        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.installer.tool, "npm");
        assert_eq!(config.temp_module_prefix, "moorage-");
        assert_eq!(config.projects[0].temp_alias, "moorage-a");
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.purge_recycled);
        assert!(config.package_review_file.is_none());
        assert!(config.pinned_versions.is_empty());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = Configuration::load(&tmp.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, GenerateError::Configuration { .. }));
    }

    #[test]
    fn test_duplicate_pin_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a" }"#);
        let path = write_config(
            tmp.path(),
            r#"
[pinned-versions]
lodash = "4.0.0"
lodash = "4.1.0"

[[projects]]
package-name = "a"
folder = "a"
"#,
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, GenerateError::Configuration { .. }));
    }

    #[test]
    fn test_alias_colliding_with_pin_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a" }"#);
        let path = write_config(
            tmp.path(),
            r#"
[pinned-versions]
moorage-a = "1.0.0"

[[projects]]
package-name = "a"
folder = "a"
"#,
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(err.to_string().contains("collides with a pinned dependency"));
    }

    #[test]
    fn test_malformed_manifest_names_project() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", "{ not json");
        let path = write_config(
            tmp.path(),
            "[[projects]]\npackage-name = \"a\"\nfolder = \"a\"\n",
        );

        match Configuration::load(&path).unwrap_err() {
            GenerateError::Manifest { project, .. } => assert_eq!(project, "a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_name_mismatch_is_manifest_error() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "b" }"#);
        let path = write_config(
            tmp.path(),
            "[[projects]]\npackage-name = \"a\"\nfolder = \"a\"\n",
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, GenerateError::Manifest { .. }));
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_invalid_version_is_manifest_error() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a", "version": "one" }"#);
        let path = write_config(
            tmp.path(),
            "[[projects]]\npackage-name = \"a\"\nfolder = \"a\"\n",
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, GenerateError::Manifest { .. }));
    }

    #[test]
    fn test_invalid_alias_is_manifest_error() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a" }"#);
        let path = write_config(
            tmp.path(),
            "[[projects]]\npackage-name = \"a\"\nfolder = \"a\"\ntemp-alias = \"../escape\"\n",
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, GenerateError::Manifest { .. }));
    }

    #[test]
    fn test_rejects_empty_prefix_and_projects() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);

        let err = Configuration::parse("temp-module-prefix = \"\"", &path).unwrap_err();
        assert!(err.to_string().contains("temp-module-prefix"));

        let err = Configuration::parse("", &path).unwrap_err();
        assert!(err.to_string().contains("[[projects]]"));

        let err = Configuration::parse("[retry]\nmax-attempts = 0\n", &path).unwrap_err();
        assert!(err.to_string().contains("max-attempts"));
    }

    #[test]
    fn test_duplicate_project_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "a", r#"{ "name": "a" }"#);
        let path = write_config(
            tmp.path(),
            r#"
[[projects]]
package-name = "a"
folder = "a"

[[projects]]
package-name = "a"
folder = "a"
"#,
        );

        let err = Configuration::load(&path).unwrap_err();
        assert!(err.to_string().contains("listed more than once"));
    }

    fn load_with_temp_folder(folder: &str) -> Result<Configuration> {
        let tmp = TempDir::new().unwrap();
        write_project(tmp.path(), "projects/app", r#"{ "name": "app" }"#);
        let contents = format!(
            "temp-modules-folder = \"{}\"\n\n{}",
            folder, "[[projects]]\npackage-name = \"app\"\nfolder = \"projects/app\"\n"
        );
        let path = write_config(tmp.path(), &contents);
        Configuration::load(&path)
    }

    #[test]
    fn test_temp_modules_folder_must_not_hold_workspace_files() {
        let cases = [
            (".", "inside the workspace root"),
            ("..", "inside the workspace root"),
            ("common/..", "inside the workspace root"),
            ("moorage.toml", "the configuration file"),
            ("common", "the common folder"),
            ("./common", "the common folder"),
            ("common/node_modules", "node_modules"),
            ("common/node_modules/cache", "node_modules"),
            ("projects", "project `app`"),
            ("projects/app", "project `app`"),
        ];

        for (folder, expected) in cases {
            let err = load_with_temp_folder(folder).unwrap_err();
            assert!(
                matches!(err, GenerateError::Configuration { .. }),
                "{folder}: {err}"
            );
            assert!(err.to_string().contains(expected), "{folder}: {err}");
        }
    }

    #[test]
    fn test_temp_modules_folder_accepts_dedicated_folders() {
        let folders = [
            "common/temp_modules",
            "build/temp",
            "projects/app-temp",
            "projects/app/tmp",
        ];
        for folder in folders {
            let config = load_with_temp_folder(folder).unwrap();
            assert!(config.temp_modules_folder.ends_with(folder), "{folder}");
        }
    }
}
