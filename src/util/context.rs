//! Global context for moorage operations.
//!
//! Holds the working directory and resolves which `moorage.toml` a command
//! runs against.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::config::CONFIG_FILE;
use crate::ops::errors::GenerateError;

/// Process-level context handed to commands.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,
}

impl GlobalContext {
    /// Create a GlobalContext for the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(GlobalContext { cwd })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext { cwd }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Find `moorage.toml` starting from cwd and searching upward.
    pub fn find_config(&self) -> Result<PathBuf, GenerateError> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(GenerateError::configuration(format!(
                    "could not find `{}` in `{}` or any parent directory",
                    CONFIG_FILE,
                    self.cwd.display()
                )));
            }
        }
    }

    /// Resolve the configuration to use: an explicit path (relative to cwd)
    /// or the nearest `moorage.toml`.
    pub fn config_path(&self, explicit: Option<&Path>) -> Result<PathBuf, GenerateError> {
        match explicit {
            Some(path) => {
                let path = self.cwd.join(path);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(GenerateError::configuration(format!(
                        "configuration file `{}` does not exist",
                        path.display()
                    )))
                }
            }
            None => self.find_config(),
        }
    }
}
