//! Folder browsing for choosing a note root.
//!
//! Unlike the gateway this walks the whole filesystem: it only ever lists
//! directory names, never file contents.

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One row of the folder picker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_parent: bool,
}

/// A directory and its subdirectories.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    pub current_path: PathBuf,
    pub folders: Vec<FolderEntry>,
}

/// List the subdirectories of `path`, preceded by a `..` entry for its
/// parent unless `path` is a filesystem root.
pub async fn browse_folder(path: &Path) -> Result<FolderListing> {
    let current = fs::canonicalize(path).await?;
    if !fs::metadata(&current).await?.is_dir() {
        return Err(Error::NotADirectory(current));
    }

    let mut folders = Vec::new();
    let mut read_dir = fs::read_dir(&current).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        folders.push(FolderEntry {
            name,
            path: entry.path(),
            is_parent: false,
        });
    }

    // Case-insensitive, ties broken by the exact name
    folders.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    if let Some(parent) = current.parent() {
        folders.insert(
            0,
            FolderEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_parent: true,
            },
        );
    }

    Ok(FolderListing {
        current_path: current,
        folders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_parent_first_then_sorted_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("zeta")).unwrap();
        std::fs::create_dir(temp.path().join("Alpha")).unwrap();
        std::fs::create_dir(temp.path().join("beta")).unwrap();
        std::fs::write(temp.path().join("file.md"), "x").unwrap();

        let listing = browse_folder(temp.path()).await.unwrap();
        let names: Vec<_> = listing.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["..", "Alpha", "beta", "zeta"]);
        assert!(listing.folders[0].is_parent);
        assert!(!listing.folders[1].is_parent);
    }

    #[tokio::test]
    async fn test_filesystem_root_has_no_parent_entry() {
        let root = if cfg!(windows) { Path::new("C:\\") } else { Path::new("/") };
        let listing = browse_folder(root).await.unwrap();
        assert!(listing.folders.iter().all(|f| !f.is_parent));
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("note.md");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            browse_folder(&file).await,
            Err(Error::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            browse_folder(&temp.path().join("missing")).await,
            Err(Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_serializes_camel_case() {
        let temp = TempDir::new().unwrap();
        let listing = browse_folder(temp.path()).await.unwrap();
        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("currentPath").is_some());
        assert_eq!(json["folders"][0]["isParent"], true);
    }
}
