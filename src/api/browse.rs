//! `/api/browse-folder`: pick a root directory.

use crate::error::Result;
use crate::files::{browse_folder, FolderListing};
use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    path: Option<String>,
}

pub async fn browse(Query(query): Query<BrowseQuery>) -> Result<Json<FolderListing>> {
    let path = match query.path.filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()?,
    };
    Ok(Json(browse_folder(&path).await?))
}
