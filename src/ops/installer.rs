//! Install/freeze driver for the external package manager.
//!
//! Full mode runs `install` and then `shrinkwrap`, which writes the lock
//! artifact. Lazy mode runs `install` only and says so.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::config::{Configuration, InstallerConfig};
use crate::ops::errors::{GenerateError, Result};
use crate::ops::events::{GenerateEvent, Reporter, Stage};
use crate::util::process::{find_executable, ProcessBuilder, ToolOutput, ToolRunner};

/// How thoroughly generate rebuilds the install directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Recycle `node_modules`, reinstall everything and refresh the shrinkwrap
    #[default]
    Full,
    /// Keep third-party packages, replace temp modules, skip the shrinkwrap
    Lazy,
}

impl InstallMode {
    /// Pick the mode from the `--lazy` flag.
    pub fn from_lazy_flag(lazy: bool) -> Self {
        if lazy {
            InstallMode::Lazy
        } else {
            InstallMode::Full
        }
    }

    /// Check if this is lazy mode.
    pub fn is_lazy(&self) -> bool {
        matches!(self, InstallMode::Lazy)
    }
}

/// Resolve the installer executable, or explain why it cannot be used.
///
/// A tool given as a path must exist relative to `root`; a bare name is looked
/// up on PATH.
pub fn ensure_installer_available(installer: &InstallerConfig, root: &Path) -> Result<PathBuf> {
    let tool = installer.tool.trim();
    if tool.is_empty() {
        return Err(GenerateError::ToolMissing {
            tool: installer.tool.clone(),
            reason: "no installer tool configured".to_string(),
        });
    }

    let looks_like_path = tool.contains('/') || tool.contains('\\');
    if looks_like_path {
        let path = root.join(tool);
        if path.is_file() {
            return Ok(path);
        }
        return Err(GenerateError::ToolMissing {
            tool: tool.to_string(),
            reason: format!("{} does not exist", path.display()),
        });
    }

    find_executable(tool).ok_or_else(|| GenerateError::ToolMissing {
        tool: tool.to_string(),
        reason: "not found on PATH".to_string(),
    })
}

/// Command line for the installer's install operation.
pub fn install_command(tool: &Path, config: &Configuration) -> ProcessBuilder {
    let mut process = ProcessBuilder::new(tool)
        .arg("install")
        .cwd(&config.common_folder);

    if let Some(cache) = &config.installer.cache_folder {
        process = process.arg("--cache").arg(cache);
    }
    if let Some(tmp) = &config.installer.tmp_folder {
        process = process.arg("--tmp").arg(tmp);
    }

    process
}

/// Command line for the installer's freeze operation.
pub fn freeze_command(tool: &Path, config: &Configuration) -> ProcessBuilder {
    ProcessBuilder::new(tool)
        .arg("shrinkwrap")
        .cwd(&config.common_folder)
}

/// Run install and, in full mode, freeze.
pub fn install_and_freeze(
    runner: &dyn ToolRunner,
    reporter: &dyn Reporter,
    tool: &Path,
    config: &Configuration,
    mode: InstallMode,
) -> Result<()> {
    run_checked(runner, reporter, &install_command(tool, config))?;

    if mode.is_lazy() {
        reporter.report(GenerateEvent::notice(
            "skipping shrinkwrap because --lazy was specified; the lock file was not refreshed",
        ));
        return Ok(());
    }

    run_checked(runner, reporter, &freeze_command(tool, config))?;
    Ok(())
}

fn run_checked(
    runner: &dyn ToolRunner,
    reporter: &dyn Reporter,
    process: &ProcessBuilder,
) -> Result<ToolOutput> {
    let command = process.display_command();
    reporter.report(GenerateEvent::ToolStarted {
        command: command.clone(),
    });

    let start = Instant::now();
    let result = runner.run(process);
    let success = matches!(&result, Ok(output) if output.is_success());
    reporter.report(GenerateEvent::ToolFinished {
        command: command.clone(),
        success,
        duration_ms: start.elapsed().as_millis() as u64,
    });

    let output = result.map_err(|e| GenerateError::ToolMissing {
        tool: process.get_program().display().to_string(),
        reason: format!("failed to start `{}`: {}", command, e),
    })?;

    if !output.is_success() {
        return Err(GenerateError::ProcessExit {
            stage: Stage::InstallAndFreeze,
            command,
            code: output.code,
            output: output.combined(),
        });
    }

    tracing::debug!("`{}` output:\n{}", command, output.combined());
    Ok(output)
}
