//! Filesystem transition controller.
//!
//! Tears down and rebuilds the directories generate owns, one state at a
//! time:
//!
//! ```text
//! CleanNodeModules -> DeleteLockArtifact -> DeleteTempModulesRoot
//!     -> RecreateAndPopulate -> Done
//! ```
//!
//! Each state is entered only from the one before it. A failed step leaves
//! the controller in the failing state and whatever was written so far on
//! disk; the next run clears the same directories again, so re-running is
//! the recovery path.

use std::fs;
use std::io;
use std::path::Path;

use crate::core::config::Configuration;
use crate::core::manifest::{to_manifest_json, MANIFEST_FILE};
use crate::ops::errors::{GenerateError, Result};
use crate::ops::events::{GenerateEvent, Reporter, Stage};
use crate::ops::installer::InstallMode;
use crate::ops::synthesize::{RootManifest, RootManifestBuilder};
use crate::ops::temp_modules::TempModules;
use crate::util::fs::{
    create_dir_with_retry, entries_with_prefix, purge_in_background, recycle_dir,
    recycled_entries, remove_dir_all_if_exists, remove_file_if_exists, write_string,
};

/// Position of the controller in the teardown/recreate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    CleanNodeModules,
    DeleteLockArtifact,
    DeleteTempModulesRoot,
    RecreateAndPopulate,
    Done,
}

impl TransitionState {
    /// The pipeline stage this state runs as, or `None` for `Done`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TransitionState::CleanNodeModules => Some(Stage::CleanNodeModules),
            TransitionState::DeleteLockArtifact => Some(Stage::DeleteLockArtifact),
            TransitionState::DeleteTempModulesRoot => Some(Stage::DeleteTempModulesRoot),
            TransitionState::RecreateAndPopulate => Some(Stage::RecreateAndPopulate),
            TransitionState::Done => None,
        }
    }

    fn next(&self) -> TransitionState {
        match self {
            TransitionState::CleanNodeModules => TransitionState::DeleteLockArtifact,
            TransitionState::DeleteLockArtifact => TransitionState::DeleteTempModulesRoot,
            TransitionState::DeleteTempModulesRoot => TransitionState::RecreateAndPopulate,
            TransitionState::RecreateAndPopulate | TransitionState::Done => TransitionState::Done,
        }
    }
}

/// Drives the on-disk transition for one generate run.
pub struct FsTransition<'a> {
    config: &'a Configuration,
    modules: &'a TempModules,
    mode: InstallMode,
    reporter: &'a dyn Reporter,
    state: TransitionState,
    root_manifest: Option<RootManifest>,
}

impl<'a> FsTransition<'a> {
    /// Create a controller in the first state.
    pub fn new(
        config: &'a Configuration,
        modules: &'a TempModules,
        mode: InstallMode,
        reporter: &'a dyn Reporter,
    ) -> Self {
        FsTransition {
            config,
            modules,
            mode,
            reporter,
            state: TransitionState::CleanNodeModules,
            root_manifest: None,
        }
    }

    /// The state the next call to [`step`](Self::step) will execute.
    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// The root install manifest, once it has been written.
    pub fn root_manifest(&self) -> Option<&RootManifest> {
        self.root_manifest.as_ref()
    }

    /// Execute the current state and advance. Returns the new state.
    ///
    /// On error the state does not advance.
    pub fn step(&mut self) -> Result<TransitionState> {
        match self.state {
            TransitionState::CleanNodeModules => self.clean_node_modules()?,
            TransitionState::DeleteLockArtifact => self.delete_lock_artifact()?,
            TransitionState::DeleteTempModulesRoot => self.delete_temp_modules_root()?,
            TransitionState::RecreateAndPopulate => self.recreate_and_populate()?,
            TransitionState::Done => {}
        }
        self.state = self.state.next();
        Ok(self.state)
    }

    /// Run every remaining state.
    pub fn run(&mut self) -> Result<()> {
        while self.state != TransitionState::Done {
            self.step()?;
        }
        Ok(())
    }

    fn clean_node_modules(&self) -> Result<()> {
        let install_dir = self.config.install_dir();
        match self.mode {
            InstallMode::Full => self.recycle_install_dir(&install_dir),
            InstallMode::Lazy => self.remove_temp_module_entries(&install_dir),
        }
    }

    fn recycle_install_dir(&self, install_dir: &Path) -> Result<()> {
        let recycler = self.config.recycler_dir();
        let recycled = recycle_dir(install_dir, &recycler).map_err(|e| {
            GenerateError::filesystem(Stage::CleanNodeModules, "recycle", install_dir, e)
        })?;

        match recycled {
            Some(recycled) => tracing::debug!(
                "recycled {} to {}",
                install_dir.display(),
                recycled.display()
            ),
            None => tracing::debug!("{} does not exist, nothing to recycle", install_dir.display()),
        }

        if self.config.purge_recycled {
            self.purge_recycler(&recycler)?;
        }
        Ok(())
    }

    // Purges everything in the recycler, including leftovers of earlier runs
    // whose purge never started or did not finish.
    fn purge_recycler(&self, recycler: &Path) -> Result<()> {
        let entries = recycled_entries(recycler).map_err(|e| {
            GenerateError::filesystem(Stage::CleanNodeModules, "list", recycler, e)
        })?;
        if entries.is_empty() {
            return Ok(());
        }

        tracing::debug!("purging {} recycled entries", entries.len());
        if let Err(e) = purge_in_background(&entries) {
            self.reporter.report(GenerateEvent::warning(format!(
                "could not start background delete of {}: {}",
                recycler.display(),
                e
            )));
        }
        Ok(())
    }

    fn remove_temp_module_entries(&self, install_dir: &Path) -> Result<()> {
        match fs::metadata(install_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(GenerateError::filesystem(
                    Stage::CleanNodeModules,
                    "read",
                    install_dir,
                    e,
                ))
            }
        }

        let prefix = &self.config.temp_module_prefix;
        let entries = entries_with_prefix(install_dir, prefix).map_err(|e| {
            GenerateError::filesystem(Stage::CleanNodeModules, "list", install_dir, e)
        })?;

        for entry in entries {
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !self.modules.has_alias(&name) {
                self.reporter.report(GenerateEvent::warning(format!(
                    "removing `{}` from {}: not a temp module of this workspace",
                    name,
                    install_dir.display()
                )));
            }
            remove_dir_all_if_exists(&entry).map_err(|e| {
                GenerateError::filesystem(Stage::CleanNodeModules, "remove", &entry, e)
            })?;
            tracing::debug!("removed {}", entry.display());
        }
        Ok(())
    }

    fn delete_lock_artifact(&self) -> Result<()> {
        let lockfile = self.config.lockfile_path();
        let removed = remove_file_if_exists(&lockfile).map_err(|e| {
            GenerateError::filesystem(Stage::DeleteLockArtifact, "delete", &lockfile, e)
        })?;
        if removed {
            tracing::debug!("deleted {}", lockfile.display());
        }
        Ok(())
    }

    fn delete_temp_modules_root(&self) -> Result<()> {
        let folder = &self.config.temp_modules_folder;
        remove_dir_all_if_exists(folder).map_err(|e| {
            GenerateError::filesystem(Stage::DeleteTempModulesRoot, "delete", folder, e)
        })?;
        Ok(())
    }

    fn recreate_and_populate(&mut self) -> Result<()> {
        let stage = Stage::RecreateAndPopulate;
        let folder = &self.config.temp_modules_folder;

        let attempts = create_dir_with_retry(folder, &self.config.retry).map_err(|e| {
            GenerateError::Filesystem {
                stage,
                action: "create",
                path: folder.clone(),
                attempts: e.attempts,
                source: e.source,
            }
        })?;
        if attempts > 1 {
            tracing::debug!("created {} after {} attempts", folder.display(), attempts);
        }

        let mut builder = RootManifestBuilder::for_config(self.config);
        for module in self.modules.by_alias() {
            let dir = self.config.temp_module_dir(&module.alias);
            fs::create_dir(&dir)
                .map_err(|e| GenerateError::filesystem(stage, "create", &dir, e))?;

            let path = dir.join(MANIFEST_FILE);
            let json = to_manifest_json(&module.manifest).map_err(|e| {
                GenerateError::manifest(&module.package_name, &path, e.to_string())
            })?;
            write_string(&path, &json)
                .map_err(|e| GenerateError::filesystem(stage, "write", &path, e))?;

            builder.add_temp_module(&module.alias)?;
        }

        let root = builder.finish();
        let path = self.config.root_manifest_path();
        write_string(&path, &root.to_json()?)
            .map_err(|e| GenerateError::filesystem(stage, "write", &path, e))?;
        tracing::debug!(
            "wrote {} with {} dependencies",
            path.display(),
            root.dependencies.len()
        );

        self.root_manifest = Some(root);
        Ok(())
    }
}
