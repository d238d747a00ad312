//! Terminal output for generate progress.
//!
//! Human mode prints one right-aligned status word per line and shows a
//! spinner while the installer runs. JSON mode prints one event object per
//! line and nothing else. Errors never go through here; `main` writes them
//! to stderr.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// How progress is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    Json,
}

/// Human output verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `--quiet`: no progress at all
    Quiet,
    #[default]
    Normal,
    /// `--verbose`: stage timings and notes, no spinner
    Verbose,
}

/// `--color` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always' or 'never'",
                s
            )),
        }
    }
}

/// Status word printed in front of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Generating,
    Cleaning,
    Writing,
    Installing,
    Running,
    Finished,
    Info,
    Warning,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Generating => "Generating",
            Status::Cleaning => "Cleaning",
            Status::Writing => "Writing",
            Status::Installing => "Installing",
            Status::Running => "Running",
            Status::Finished => "Finished",
            Status::Info => "Info",
            Status::Warning => "Warning",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished => "\x1b[1;32m",
            Status::Generating
            | Status::Cleaning
            | Status::Writing
            | Status::Installing
            | Status::Running => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Warning => "\x1b[1;33m",
        }
    }
}

const STATUS_WIDTH: usize = 12;

/// Progress output shared by the command and its reporter.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
    #[cfg(test)]
    json_output: Mutex<Vec<String>>,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stdout().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell {
            mode,
            use_color,
            #[cfg(test)]
            json_output: Mutex::new(Vec::new()),
        }
    }

    /// Build a shell from the global CLI flags. `--message-format json` wins
    /// over `--quiet` and `--verbose`.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        if json {
            return Shell::new(ShellMode::Json);
        }

        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(ShellMode::Human { verbosity, color })
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Print `{status:>12} {msg}`. Nothing is printed in quiet or JSON mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() || self.is_quiet() {
            return;
        }
        println!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print one JSON event line. Ignored in human mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.is_json() {
            return;
        }

        let line = serde_json::to_string(event).unwrap_or_default();
        println!("{}", line);
        let _ = io::stdout().flush();

        #[cfg(test)]
        if let Ok(mut lines) = self.json_output.lock() {
            lines.push(line);
        }
    }

    /// JSON lines printed so far.
    #[cfg(test)]
    pub fn json_lines(&self) -> Vec<String> {
        self.json_output
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn format_status(&self, status: Status) -> String {
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                status.as_str(),
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", status.as_str(), width = STATUS_WIDTH)
        }
    }

    /// Start a spinner. Only normal human mode draws one.
    pub fn spinner(&self, msg: impl Display) -> Spinner {
        Spinner::new(self, msg.to_string())
    }
}

/// Spinner shown while a tool runs; cleared on drop.
pub struct Spinner {
    pb: Option<ProgressBar>,
}

impl Spinner {
    const TICK: Duration = Duration::from_millis(120);

    fn new(shell: &Shell, message: String) -> Self {
        if shell.is_quiet() || shell.is_verbose() || shell.is_json() {
            return Spinner { pb: None };
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Self::TICK);
        Spinner { pb: Some(pb) }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}

/// Format an elapsed time as seconds, or minutes past one minute.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
