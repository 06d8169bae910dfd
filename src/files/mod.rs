//! File operations module for Marknotes
//!
//! This module provides the filesystem gateway the note UI lists, reads and
//! edits documents through, and the folder browser used to pick a root.

mod browse;
mod entry;
mod gateway;

pub use browse::{browse_folder, FolderListing};
pub use entry::{is_document, relative_path, DOCUMENT_EXTENSION};
pub use gateway::{FileGateway, PathContents};
