//! Test utilities and mocks for moorage unit tests.
//!
//! This module provides mock implementations for the seams of the generate
//! pipeline: the tool runner that stands in for the external installer, and
//! a reporter that records every event.
//!
//! # Example
//!
//! ```rust,ignore
//! use moorage::test_support::{RecordingRunner, RecordingReporter, WorkspaceFixture};
//!
//! #[test]
//! fn test_example() {
//!     let fixture = WorkspaceFixture::new().project("@acme/a", &[("lodash", "^4.0.0")]).build();
//!     let runner = RecordingRunner::new().fail_on("npm shrinkwrap", 1, "boom");
//!     let reporter = RecordingReporter::new();
//!
//!     // Run generate against fixture.config_path() with the mocks...
//! }
//! ```

pub mod fixtures;

use std::io;
use std::path::Path;
use std::sync::Mutex;

use crate::core::config::{NODE_MODULES, SHRINKWRAP_FILE};
use crate::core::manifest::{PackageManifest, MANIFEST_FILE};
use crate::ops::events::{GenerateEvent, Reporter, Stage};
use crate::ops::synthesize::RootManifest;
use crate::util::process::{ProcessBuilder, ToolOutput, ToolRunner};

// Re-export fixtures for convenience
pub use fixtures::*;

/// A scripted failure for one command.
#[derive(Debug, Clone)]
struct Failure {
    command_prefix: String,
    output: ToolOutput,
}

/// Mock installer that records calls and imitates npm on disk.
///
/// `install` creates `node_modules/<name>` for every dependency of the root
/// manifest in its working directory, if there is one; `shrinkwrap` writes
/// the lock file.
/// Commands matching a registered failure return that failure instead and
/// touch nothing.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ProcessBuilder>>,
    failures: Vec<Failure>,
    unavailable: bool,
}

impl RecordingRunner {
    /// Create a runner where every command succeeds.
    pub fn new() -> Self {
        RecordingRunner::default()
    }

    /// Fail commands whose display form starts with `command_prefix`.
    pub fn fail_on(mut self, command_prefix: &str, code: i32, stderr: &str) -> Self {
        self.failures.push(Failure {
            command_prefix: command_prefix.to_string(),
            output: ToolOutput::failure(code, stderr),
        });
        self
    }

    /// Make every command fail to start.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Display form of every recorded call, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(ProcessBuilder::display_command)
            .collect()
    }

    fn simulate(&self, process: &ProcessBuilder) -> io::Result<()> {
        let Some(cwd) = process.get_cwd() else {
            return Ok(());
        };

        match process.get_args().first().map(String::as_str) {
            Some("install") => {
                let contents = match std::fs::read_to_string(cwd.join(MANIFEST_FILE)) {
                    Ok(contents) => contents,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e),
                };
                let root: RootManifest = serde_json::from_str(&contents)?;
                for name in root.dependencies.keys() {
                    let dir = cwd.join(NODE_MODULES).join(name);
                    std::fs::create_dir_all(&dir)?;
                    let manifest = PackageManifest {
                        name: Some(name.clone()),
                        ..Default::default()
                    };
                    std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&manifest)?)?;
                }
            }
            Some("shrinkwrap") => {
                let lock = serde_json::json!({ "name": "moorage-common", "lockfileVersion": 1 });
                std::fs::write(cwd.join(SHRINKWRAP_FILE), lock.to_string())?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, process: &ProcessBuilder) -> io::Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(process.clone());
        }

        if self.unavailable {
            return Err(io::Error::new(io::ErrorKind::NotFound, "program not found"));
        }

        let command = process.display_command();
        if let Some(failure) = self
            .failures
            .iter()
            .find(|f| command.starts_with(&f.command_prefix))
        {
            return Ok(failure.output.clone());
        }

        self.simulate(process)?;
        Ok(ToolOutput::success(format!("ran {}", command)))
    }
}

/// Reporter that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<GenerateEvent>>,
}

impl RecordingReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        RecordingReporter::default()
    }

    /// All events, in order.
    pub fn events(&self) -> Vec<GenerateEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stages that were started, in order.
    pub fn stages_started(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GenerateEvent::StageStarted { stage } => Some(stage),
                _ => None,
            })
            .collect()
    }

    /// Stages that finished, in order.
    pub fn stages_finished(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GenerateEvent::StageFinished { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    /// Notice messages, in order.
    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GenerateEvent::Notice { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Warning messages, in order.
    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GenerateEvent::Warning { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: GenerateEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Check that a directory contains exactly the given entry names.
pub fn assert_dir_entries(dir: &Path, expected: &[&str]) {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(names, expected, "entries of {}", dir.display());
}
