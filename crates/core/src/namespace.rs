//! Namespace — the isolation key scoping all persisted state.
//!
//! Every task, memory record, file-change event, and vector entry belongs to
//! exactly one namespace. Queries always filter on it; no operation spans
//! namespaces.
//!
//! The active namespace for a working project is persisted as a one-line
//! marker file, read once at agent start-up and written at project
//! initialization.

use crate::error::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A project namespace. Opaque, non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace from a non-empty string.
    pub fn new(s: impl Into<String>) -> Result<Self, CoordinatorError> {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoordinatorError::NamespaceMissing(
                "namespace must be a non-empty string".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the active namespace from a marker file.
    ///
    /// The file holds a single line; surrounding whitespace is ignored.
    /// A missing or empty file is fatal for the caller: no task may be
    /// claimed without a resolved namespace.
    pub fn read_from(path: &Path) -> Result<Self, CoordinatorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoordinatorError::NamespaceMissing(format!(
                "cannot read namespace file {}: {e}",
                path.display()
            ))
        })?;
        Self::new(raw)
    }

    /// Persist this namespace to a marker file (project initialization).
    pub fn write_to(&self, path: &Path) -> Result<(), CoordinatorError> {
        std::fs::write(path, format!("{}\n", self.0)).map_err(|e| {
            CoordinatorError::NamespaceMissing(format!(
                "cannot write namespace file {}: {e}",
                path.display()
            ))
        })
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Namespace {
    type Error = CoordinatorError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}
