//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use glob::{glob_with, MatchOptions, Pattern};

use crate::util::process::ProcessBuilder;

/// How often and how patiently a transient filesystem operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after every failure
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            initial_delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(5, Duration::from_millis(100))
    }
}

/// Error from an operation that exhausted its retries.
#[derive(Debug)]
pub struct RetryError {
    pub attempts: u32,
    pub source: io::Error,
}

/// Run `op` until it succeeds or the policy gives up, with exponential backoff.
///
/// Returns the value and the number of attempts it took.
pub fn retry_with_backoff<T, F>(policy: &RetryPolicy, mut op: F) -> Result<(T, u32), RetryError>
where
    F: FnMut() -> io::Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    source: e,
                })
            }
            Err(e) => {
                tracing::debug!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}

/// Create a directory (and its parents), retrying transient failures.
pub fn create_dir_with_retry(path: &Path, policy: &RetryPolicy) -> Result<u32, RetryError> {
    retry_with_backoff(policy, || fs::create_dir_all(path)).map(|((), attempts)| attempts)
}

/// Remove a directory and all its contents, if it exists.
///
/// Returns whether anything was removed.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map(|()| true),
        Ok(_) => fs::remove_file(path).map(|()| true),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a file, if it exists.
///
/// Returns whether the file was removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if is_absent(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

// A path below a regular file cannot exist either.
fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Move a directory aside into `recycler` instead of deleting it.
///
/// The rename is the only synchronous step, so an interrupted run leaves
/// either the original directory or its recycled copy, never a half-deleted
/// tree. Returns the new location, or `None` if `path` did not exist.
pub fn recycle_dir(path: &Path, recycler: &Path) -> io::Result<Option<PathBuf>> {
    match fs::symlink_metadata(path) {
        Ok(_) => {}
        Err(e) if is_absent(&e) => return Ok(None),
        Err(e) => return Err(e),
    }

    fs::create_dir_all(recycler)?;

    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recycled".to_string());
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    let mut destination = recycler.join(format!("{}-{}", base, stamp));
    let mut n = 1;
    while destination.exists() {
        destination = recycler.join(format!("{}-{}-{}", base, stamp, n));
        n += 1;
    }

    fs::rename(path, &destination)?;
    Ok(Some(destination))
}

/// List every entry of the recycler, sorted. A missing recycler is empty.
pub fn recycled_entries(recycler: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(recycler) {
        Ok(entries) => entries,
        Err(e) if is_absent(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

/// Delete recycled entries in one detached OS process.
///
/// The child is not waited on; whatever it fails to delete stays in the
/// recycler and is picked up by the next purge.
pub fn purge_in_background(paths: &[PathBuf]) -> io::Result<()> {
    if paths.is_empty() {
        return Ok(());
    }
    background_delete_command(paths).spawn_detached()
}

#[cfg(windows)]
fn background_delete_command(paths: &[PathBuf]) -> ProcessBuilder {
    ProcessBuilder::new("cmd")
        .args(["/C", "rmdir", "/S", "/Q"])
        .args(paths)
}

#[cfg(not(windows))]
fn background_delete_command(paths: &[PathBuf]) -> ProcessBuilder {
    ProcessBuilder::new("rm").arg("-rf").args(paths)
}

/// List entries of `dir` whose file name starts with `prefix`.
///
/// Matching is a glob over the literal prefix; the directory and prefix are
/// escaped so neither can inject glob syntax.
///
/// An entry that cannot be read fails the whole listing.
pub fn entries_with_prefix(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let pattern = Path::new(&Pattern::escape(&dir.to_string_lossy()))
        .join(format!("{}*", Pattern::escape(prefix)));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let paths = glob_with(&pattern.to_string_lossy(), options)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut results = paths
        .map(|entry| entry.map_err(glob::GlobError::into_error))
        .collect::<io::Result<Vec<_>>>()?;
    results.sort();
    Ok(results)
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// The paths compared at configuration load may not exist yet, so
/// `canonicalize` is no use here. A `..` that climbs above the start of a
/// relative path is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Get the relative path from `base` to `path` with `/` separators.
pub fn relative_unix_path(base: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}
