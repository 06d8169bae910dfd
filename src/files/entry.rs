//! File tree entries and path helpers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Extension of the documents the UI edits.
pub const DOCUMENT_EXTENSION: &str = "md";

// ─────────────────────────────────────────────────────────────────────────────
// Entry Types
// ─────────────────────────────────────────────────────────────────────────────

/// The kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// A file or directory in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    /// Display name of the file or folder
    pub name: String,

    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Path relative to the root, `/`-separated
    pub path: String,

    /// Last modification time
    pub modified: DateTime<Utc>,

    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileEntry {
    /// Create a directory entry.
    pub fn directory(name: String, path: String, modified: DateTime<Utc>) -> Self {
        Self {
            name,
            kind: EntryKind::Directory,
            path,
            modified,
            size: None,
        }
    }

    /// Create a file entry.
    pub fn file(name: String, path: String, modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            name,
            kind: EntryKind::File,
            path,
            modified,
            size: Some(size),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// A file's content together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileContent {
    pub content: String,
    pub name: String,
    pub path: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// Result of creating a file or directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedEntry {
    pub path: String,
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Sort entries: directories first, then by name.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| match (a.is_directory(), b.is_directory()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

/// Whether a path names a document (by extension).
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == DOCUMENT_EXTENSION)
}

/// Append the document extension to a name not already ending in it.
pub fn with_document_extension(name: &str) -> String {
    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// An absolute component restarts the path, and `..` never climbs above the
/// filesystem root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Express `path` relative to `root` with `/` separators.
///
/// Returns `None` if `path` is not inside `root` or is not valid UTF-8.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Modification time from metadata, or the epoch where unsupported.
pub fn modified_time(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
