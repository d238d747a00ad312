//! Pinned-version table.
//!
//! Pinned versions are exact overrides supplied by configuration. They are
//! written into the root install manifest before any temp module reference and
//! always keep their configuration order.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Error when building a pinned-version table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("`{name}` is pinned more than once (`{existing}` and `{requested}`)")]
    Duplicate {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("pinned dependency name cannot be empty")]
    EmptyName,

    #[error("pinned version for `{0}` cannot be empty")]
    EmptyVersion(String),
}

/// Ordered mapping of dependency name to the version that must win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PinnedVersions {
    entries: IndexMap<String, String>,
}

impl PinnedVersions {
    /// Create an empty table.
    pub fn new() -> Self {
        PinnedVersions::default()
    }

    /// Build a table from pairs, rejecting duplicates.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, PinError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut pinned = PinnedVersions::new();
        for (name, version) in pairs {
            pinned.insert(name, version)?;
        }
        Ok(pinned)
    }

    /// Append a pin. A name may only be pinned once.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<(), PinError> {
        let name = name.into();
        let version = version.into();

        if name.trim().is_empty() {
            return Err(PinError::EmptyName);
        }
        if version.trim().is_empty() {
            return Err(PinError::EmptyVersion(name));
        }
        if let Some(existing) = self.entries.get(&name) {
            return Err(PinError::Duplicate {
                name,
                existing: existing.clone(),
                requested: version,
            });
        }

        self.entries.insert(name, version);
        Ok(())
    }

    /// Get the pinned version for a dependency.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Check whether a dependency is pinned.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate pins in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    /// Number of pins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no pins.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for PinnedVersions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, String>::deserialize(deserializer)?;
        PinnedVersions::from_pairs(raw).map_err(serde::de::Error::custom)
    }
}
