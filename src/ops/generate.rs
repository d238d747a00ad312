//! Implementation of `moorage generate`.
//!
//! Runs the six stages strictly in order:
//!
//! 1. load the configuration, derive temp modules, snapshot dependencies
//!    for review
//! 2. clean `node_modules` (recycle in full mode, prune temp modules in lazy)
//! 3. delete the stale shrinkwrap
//! 4. delete the temp modules folder
//! 5. recreate the temp modules and write the root `package.json`
//! 6. check the installer, then install and (full mode) shrinkwrap
//!
//! The first fatal error stops the run. Nothing is rolled back.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::config::Configuration;
use crate::ops::errors::Result;
use crate::ops::events::{GenerateEvent, Reporter, Stage};
use crate::ops::installer::{ensure_installer_available, install_and_freeze, InstallMode};
use crate::ops::review::snapshot_current_dependencies;
use crate::ops::temp_modules::{generate_temp_modules, TempModules};
use crate::ops::transition::FsTransition;
use crate::util::process::ToolRunner;

/// Options for the generate command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Full or lazy generate
    pub mode: InstallMode,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    pub mode: InstallMode,
    pub temp_modules: usize,
    pub duration: Duration,

    /// Root install manifest that was written
    pub root_manifest: PathBuf,

    /// Lock artifact, if this run produced one
    pub lockfile: Option<PathBuf>,
}

/// Run the generate pipeline against the workspace described by `config_path`.
pub fn generate(
    config_path: &Path,
    options: GenerateOptions,
    runner: &dyn ToolRunner,
    reporter: &dyn Reporter,
) -> Result<GenerateSummary> {
    let start = Instant::now();
    let mut pipeline = Pipeline {
        reporter,
        current: Stage::LoadConfiguration,
    };

    match pipeline.run(config_path, options.mode, runner) {
        Ok((config, modules)) => {
            let duration = start.elapsed();
            reporter.report(GenerateEvent::GenerateFinished {
                lazy: options.mode.is_lazy(),
                temp_modules: modules.len(),
                duration_ms: duration.as_millis() as u64,
            });

            let lockfile = config.lockfile_path();
            Ok(GenerateSummary {
                mode: options.mode,
                temp_modules: modules.len(),
                duration,
                root_manifest: config.root_manifest_path(),
                lockfile: (!options.mode.is_lazy() && lockfile.is_file()).then_some(lockfile),
            })
        }
        Err(e) => {
            reporter.report(GenerateEvent::GenerateFailed {
                stage: e.stage().unwrap_or(pipeline.current),
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

struct Pipeline<'a> {
    reporter: &'a dyn Reporter,
    current: Stage,
}

impl Pipeline<'_> {
    fn run(
        &mut self,
        config_path: &Path,
        mode: InstallMode,
        runner: &dyn ToolRunner,
    ) -> Result<(Configuration, TempModules)> {
        let reporter = self.reporter;

        let (config, modules) = self.stage(Stage::LoadConfiguration, || {
            let config = Configuration::load(config_path)?;
            let modules = generate_temp_modules(&config.projects)?;
            match snapshot_current_dependencies(&config) {
                Ok(Some(count)) => {
                    tracing::debug!("snapshotted {} dependencies for review", count)
                }
                Ok(None) => {}
                Err(e) => reporter.report(GenerateEvent::warning(format!(
                    "could not snapshot dependencies for review: {:#}",
                    e
                ))),
            }
            Ok((config, modules))
        })?;

        let mut transition = FsTransition::new(&config, &modules, mode, reporter);
        while let Some(stage) = transition.state().stage() {
            self.stage(stage, || transition.step())?;
        }

        self.stage(Stage::InstallAndFreeze, || {
            let tool = ensure_installer_available(&config.installer, &config.root)?;
            install_and_freeze(runner, reporter, &tool, &config, mode)
        })?;

        Ok((config, modules))
    }

    fn stage<T>(&mut self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.current = stage;
        self.reporter.report(GenerateEvent::StageStarted { stage });
        let start = Instant::now();

        let value = f()?;

        self.reporter.report(GenerateEvent::StageFinished {
            stage,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        Ok(value)
    }
}
