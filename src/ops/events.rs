//! Generate events and reporters.
//!
//! The pipeline never prints. It emits [`GenerateEvent`]s to a [`Reporter`],
//! and the reporter decides how to present them. [`ShellReporter`] renders
//! them through the [`Shell`] as status lines or, with
//! `--message-format=json`, as one JSON object per line.
//!
//! # Event Types
//!
//! - `stage-started` / `stage-finished`: one pair per pipeline stage
//! - `notice`: informational message (e.g. shrinkwrap skipped in lazy mode)
//! - `warning`: non-fatal problem (e.g. review snapshot failed)
//! - `tool-started` / `tool-finished`: an installer command ran
//! - `generate-finished`: the whole pipeline succeeded
//! - `generate-failed`: a stage failed and the pipeline stopped

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::util::shell::{format_duration, Shell, Spinner, Status};

/// The six stages of `moorage generate`, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    LoadConfiguration,
    CleanNodeModules,
    DeleteLockArtifact,
    DeleteTempModulesRoot,
    RecreateAndPopulate,
    InstallAndFreeze,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::LoadConfiguration,
        Stage::CleanNodeModules,
        Stage::DeleteLockArtifact,
        Stage::DeleteTempModulesRoot,
        Stage::RecreateAndPopulate,
        Stage::InstallAndFreeze,
    ];

    /// Stable machine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadConfiguration => "load-configuration",
            Stage::CleanNodeModules => "clean-node-modules",
            Stage::DeleteLockArtifact => "delete-lock-artifact",
            Stage::DeleteTempModulesRoot => "delete-temp-modules-root",
            Stage::RecreateAndPopulate => "recreate-and-populate",
            Stage::InstallAndFreeze => "install-and-freeze",
        }
    }

    /// One-based position in the pipeline.
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    fn describe(&self) -> &'static str {
        match self {
            Stage::LoadConfiguration => "configuration",
            Stage::CleanNodeModules => "node_modules",
            Stage::DeleteLockArtifact => "stale shrinkwrap",
            Stage::DeleteTempModulesRoot => "temp modules",
            Stage::RecreateAndPopulate => "temp modules and root package.json",
            Stage::InstallAndFreeze => "dependencies",
        }
    }

    fn status(&self) -> Status {
        match self {
            Stage::LoadConfiguration => Status::Generating,
            Stage::CleanNodeModules | Stage::DeleteLockArtifact | Stage::DeleteTempModulesRoot => {
                Status::Cleaning
            }
            Stage::RecreateAndPopulate => Status::Writing,
            Stage::InstallAndFreeze => Status::Installing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event emitted while generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum GenerateEvent {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        duration_ms: u64,
    },
    Notice {
        message: String,
    },
    Warning {
        message: String,
    },
    ToolStarted {
        command: String,
    },
    ToolFinished {
        command: String,
        success: bool,
        duration_ms: u64,
    },
    GenerateFinished {
        lazy: bool,
        temp_modules: usize,
        duration_ms: u64,
    },
    GenerateFailed {
        stage: Stage,
        message: String,
    },
}

impl GenerateEvent {
    /// Create a notice event.
    pub fn notice(message: impl Into<String>) -> Self {
        GenerateEvent::Notice {
            message: message.into(),
        }
    }

    /// Create a warning event.
    pub fn warning(message: impl Into<String>) -> Self {
        GenerateEvent::Warning {
            message: message.into(),
        }
    }
}

/// Observer of generate progress.
pub trait Reporter {
    fn report(&self, event: GenerateEvent);
}

/// Renders events through the shell.
pub struct ShellReporter {
    shell: Arc<Shell>,
    spinner: Mutex<Option<Spinner>>,
    failed_stage: Mutex<Option<Stage>>,
}

impl ShellReporter {
    pub fn new(shell: Arc<Shell>) -> Self {
        ShellReporter {
            shell,
            spinner: Mutex::new(None),
            failed_stage: Mutex::new(None),
        }
    }

    /// The stage named by the last `GenerateFailed` event.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.failed_stage.lock().ok().and_then(|stage| *stage)
    }

    fn set_spinner(&self, spinner: Option<Spinner>) {
        if let Ok(mut slot) = self.spinner.lock() {
            // Dropping the previous spinner clears it from the terminal
            *slot = spinner;
        }
    }

    fn render_human(&self, event: &GenerateEvent) {
        let shell = &self.shell;
        match event {
            GenerateEvent::StageStarted { stage } => {
                shell.status(
                    stage.status(),
                    format!("{} [{}/{}]", stage.describe(), stage.number(), Stage::ALL.len()),
                );
            }
            GenerateEvent::StageFinished { stage, duration_ms } => {
                if shell.is_verbose() {
                    shell.note(format!("{} took {}ms", stage, duration_ms));
                }
            }
            GenerateEvent::Notice { message } => shell.note(message),
            GenerateEvent::Warning { message } => shell.warn(message),
            GenerateEvent::ToolStarted { command } => {
                shell.status(Status::Running, format!("`{}`", command));
                self.set_spinner(Some(shell.spinner(command)));
            }
            GenerateEvent::ToolFinished { .. } => self.set_spinner(None),
            GenerateEvent::GenerateFinished {
                lazy, duration_ms, ..
            } => {
                let elapsed = format_duration(std::time::Duration::from_millis(*duration_ms));
                let mode = if *lazy { " (lazy)" } else { "" };
                shell.status(Status::Finished, format!("generate{} in {}", mode, elapsed));
            }
            GenerateEvent::GenerateFailed { .. } => self.set_spinner(None),
        }
    }
}

impl Reporter for ShellReporter {
    fn report(&self, event: GenerateEvent) {
        if let GenerateEvent::GenerateFailed { stage, .. } = &event {
            if let Ok(mut failed) = self.failed_stage.lock() {
                *failed = Some(*stage);
            }
        }

        if self.shell.is_json() {
            if let Ok(value) = serde_json::to_value(&event) {
                self.shell.json_event(&value);
            }
            return;
        }
        self.render_human(&event);
    }
}
