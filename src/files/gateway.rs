//! Filesystem gateway.
//!
//! A request-scoped view of one root directory. Every operation resolves its
//! relative path against the canonical root and refuses anything that lands
//! outside it before touching the filesystem.

use super::entry::{
    is_document, modified_time, normalize_lexically, relative_path, sort_entries,
    with_document_extension, CreatedEntry, FileContent, FileEntry,
};
use crate::error::{Error, Result};
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// What a path resolved to when read without knowing its kind up front.
#[derive(Debug, Clone, PartialEq)]
pub enum PathContents {
    Directory(Vec<FileEntry>),
    File(FileContent),
}

/// Filesystem operations confined to a root directory.
#[derive(Debug, Clone)]
pub struct FileGateway {
    /// Canonical root path
    root: PathBuf,
}

impl FileGateway {
    /// Open a gateway over `root`, which must exist.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref()).await?;
        Ok(Self { root })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Path Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a relative path, rejecting anything outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        self.contain(normalize_lexically(&self.root.join(relative)))
    }

    fn contain(&self, path: PathBuf) -> Result<PathBuf> {
        if path.starts_with(&self.root) {
            debug!("Resolved {}", path.display());
            Ok(path)
        } else {
            Err(Error::AccessDenied(path.display().to_string()))
        }
    }

    fn relative(&self, path: &Path) -> String {
        relative_path(&self.root, path).unwrap_or_else(|| path.to_string_lossy().into_owned())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// List a directory, or read a file, depending on what `relative` names.
    pub async fn get(&self, relative: &str) -> Result<PathContents> {
        let path = self.resolve(relative)?;
        if fs::metadata(&path).await?.is_dir() {
            Ok(PathContents::Directory(self.list(relative).await?))
        } else {
            Ok(PathContents::File(self.read(relative).await?))
        }
    }

    /// List the immediate children of a directory.
    ///
    /// Every subdirectory is included; files only when they are documents.
    pub async fn list(&self, relative: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve(relative)?;
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(_) => continue, // Skip entries with invalid UTF-8 names
            };
            let file_type = entry.file_type().await?;
            let path = entry.path();

            if !file_type.is_dir() && !(file_type.is_file() && is_document(&path)) {
                continue;
            }

            // The entry may vanish between listing and stat
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let relative = self.relative(&path);
            let modified = modified_time(&metadata);
            entries.push(if file_type.is_dir() {
                FileEntry::directory(name, relative, modified)
            } else {
                FileEntry::file(name, relative, modified, metadata.len())
            });
        }

        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Read a file's full text and metadata.
    pub async fn read(&self, relative: &str) -> Result<FileContent> {
        let path = self.resolve(relative)?;
        let metadata = fs::metadata(&path).await?;
        let content = fs::read_to_string(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(FileContent {
            content,
            name,
            path: self.relative(&path),
            modified: modified_time(&metadata),
            size: metadata.len(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new document in `dir`. The document extension is appended
    /// when `name` lacks it.
    pub async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: Option<&str>,
    ) -> Result<CreatedEntry> {
        if name.trim().is_empty() {
            return Err(Error::BadRequest("name is required".to_string()));
        }
        let file_name = with_document_extension(name);
        let parent = self.resolve(dir)?;
        let target = self.contain(normalize_lexically(&parent.join(&file_name)))?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::AlreadyExists("File already exists".to_string()),
                _ => Error::Io(e),
            })?;
        file.write_all(content.unwrap_or_default().as_bytes())
            .await
            .map_err(|source| Error::FileWrite {
                path: target.clone(),
                source,
            })?;
        file.flush().await?;

        info!("Created file {}", target.display());
        Ok(CreatedEntry {
            path: self.relative(&target),
            name: file_name,
        })
    }

    /// Create a directory (and any missing parents) in `dir`.
    pub async fn create_directory(&self, dir: &str, name: &str) -> Result<CreatedEntry> {
        if name.trim().is_empty() {
            return Err(Error::BadRequest("name is required".to_string()));
        }
        let parent = self.resolve(dir)?;
        let target = self.contain(normalize_lexically(&parent.join(name)))?;

        if fs::try_exists(&target).await? {
            return Err(Error::AlreadyExists("Directory already exists".to_string()));
        }
        fs::create_dir_all(&target).await?;

        info!("Created directory {}", target.display());
        Ok(CreatedEntry {
            path: self.relative(&target),
            name: name.to_string(),
        })
    }

    /// Overwrite (or create) a file with new content.
    ///
    /// Not atomic: a crash mid-write can leave the file truncated.
    pub async fn save_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        fs::write(&path, content)
            .await
            .map_err(|source| Error::FileWrite {
                path: path.clone(),
                source,
            })?;
        debug!("Saved {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// Delete a file, or a directory with everything below it.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        if path == self.root {
            return Err(Error::AccessDenied(path.display().to_string()));
        }

        // Symlinks are removed themselves, never followed
        let metadata = fs::symlink_metadata(&path).await?;
        if metadata.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }

        info!("Deleted {}", path.display());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
