//! Generate error types and diagnostics.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::ops::events::Stage;

/// Result alias used across the generate operations.
pub type Result<T, E = GenerateError> = std::result::Result<T, E>;

/// Fatal error during `moorage generate`.
///
/// Messages do not name the stage; the pipeline reports it alongside the
/// error in its `GenerateFailed` event. No variant is retried by the pipeline itself; filesystem operations that
/// retry do so before producing a `Filesystem` error.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(moorage::configuration),
        help("fix moorage.toml and run `moorage generate` again")
    )]
    Configuration { message: String },

    #[error("invalid manifest for project `{project}` ({}): {message}", .path.display())]
    #[diagnostic(code(moorage::manifest))]
    Manifest {
        project: String,
        path: PathBuf,
        message: String,
    },

    #[error("failed to {action} {}{}", .path.display(), attempts_suffix(.attempts))]
    #[diagnostic(
        code(moorage::filesystem),
        help("close programs holding files in the common folder and run `moorage generate` again")
    )]
    Filesystem {
        stage: Stage,
        action: &'static str,
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("installer `{tool}` is not available: {reason}")]
    #[diagnostic(
        code(moorage::tool_missing),
        help("install the tool or point `[installer] tool` in moorage.toml at it")
    )]
    ToolMissing { tool: String, reason: String },

    #[error("`{command}` failed with {}\n{output}", describe_exit(.code))]
    #[diagnostic(code(moorage::process_exit))]
    ProcessExit {
        stage: Stage,
        command: String,
        code: Option<i32>,
        output: String,
    },
}

impl GenerateError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        GenerateError::Configuration {
            message: message.into(),
        }
    }

    /// Create a manifest error for a project.
    pub fn manifest(
        project: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        GenerateError::Manifest {
            project: project.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a filesystem error for a single, unretried attempt.
    pub fn filesystem(
        stage: Stage,
        action: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        GenerateError::Filesystem {
            stage,
            action,
            path: path.into(),
            attempts: 1,
            source,
        }
    }

    /// The stage this error was raised in, if it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GenerateError::Filesystem { stage, .. } | GenerateError::ProcessExit { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

fn attempts_suffix(attempts: &u32) -> String {
    if *attempts > 1 {
        format!(" after {} attempts", attempts)
    } else {
        String::new()
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
