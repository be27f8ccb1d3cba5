//! Form Registry - saved builder forms discovered on disk

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::layout::FORM_EXTENSION;

/// Display name given to records saved without one.
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Cannot read forms directory {}: {source}", dir.display())]
    Unreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No saved forms found in {}", dir.display())]
    Empty { dir: PathBuf },
}

/// Minimal metadata of one saved form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRecord {
    id: String,
    name: String,
    updated_at: i64,
    path: PathBuf,
}

/// Absent and `null` fields both fall back to their defaults.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl FormRecord {
    /// Parse a saved form document. Anything but a JSON object is rejected.
    pub fn from_json(content: &str, path: impl Into<PathBuf>) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("form record is not a JSON object"));
        }
        let raw: RawRecord = serde_json::from_value(value)?;
        let name = match raw.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNTITLED.to_string(),
        };
        Ok(Self {
            id: raw.id.unwrap_or_default(),
            name,
            updated_at: raw.updated_at.unwrap_or_default(),
            path: path.into(),
        })
    }

    /// Parse raw file bytes. Bytes that are not UTF-8 are replaced rather
    /// than rejected.
    pub fn from_bytes(content: &[u8], path: impl Into<PathBuf>) -> Result<Self, serde_json::Error> {
        Self::from_json(&String::from_utf8_lossy(content), path)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seconds since the Unix epoch.
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Backing file of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Scan `dir` (non-recursive) for saved forms, newest first.
///
/// Files that cannot be read or decoded are skipped. An empty result is not
/// an error here; see [`discover`].
pub fn scan(dir: &Path) -> Result<Vec<FormRecord>, RegistryError> {
    let unreadable = |source| RegistryError::Unreadable {
        dir: dir.to_path_buf(),
        source,
    };

    let mut candidates = vec![];
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == FORM_EXTENSION) {
            candidates.push(path);
        }
    }
    // read_dir order is platform-defined; sort so ties stay stable per run
    candidates.sort();

    let mut records = vec![];
    for path in candidates {
        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable form");
                continue;
            }
        };
        match FormRecord::from_bytes(&content, &path) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping malformed form");
            }
        }
    }

    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    tracing::debug!(dir = %dir.display(), count = records.len(), "scanned form registry");
    Ok(records)
}

/// Like [`scan`], but an empty registry is reported as [`RegistryError::Empty`].
pub fn discover(dir: &Path) -> Result<Vec<FormRecord>, RegistryError> {
    let records = scan(dir)?;
    if records.is_empty() {
        return Err(RegistryError::Empty {
            dir: dir.to_path_buf(),
        });
    }
    Ok(records)
}
