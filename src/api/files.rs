//! `/api/files`: list, read, create, save and delete notes.

use super::{json_body, required, AppState};
use crate::error::{Error, Result};
use crate::files::{FileGateway, PathContents};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    root: Option<String>,
    path: Option<String>,
}

/// List a directory or read a file.
pub async fn get_files(
    State(state): State<AppState>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Value>> {
    let gateway = FileGateway::open(state.root_or_default(query.root.as_deref())).await?;
    let contents = gateway.get(query.path.as_deref().unwrap_or_default()).await?;

    let body = match contents {
        PathContents::Directory(items) => json!({ "items": items }),
        PathContents::File(file) => serde_json::to_value(file)
            .map_err(|e| Error::Application(format!("Failed to encode file: {}", e)))?,
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    #[serde(default)]
    action: String,
    path: Option<String>,
    content: Option<String>,
    name: Option<String>,
    root_path: Option<String>,
}

/// Mutate the tree: `create_file`, `create_directory`, `save_file`, `delete`.
pub async fn post_files(
    State(state): State<AppState>,
    body: std::result::Result<Json<FileAction>, JsonRejection>,
) -> Result<Json<Value>> {
    let request = json_body(body)?;
    let gateway = FileGateway::open(state.root_or_default(request.root_path.as_deref())).await?;
    let path = request.path.unwrap_or_default();

    match request.action.as_str() {
        "create_file" => {
            let name = required(request.name, "name")?;
            let created = gateway
                .create_file(&path, &name, request.content.as_deref())
                .await?;
            Ok(Json(
                json!({ "success": true, "path": created.path, "name": created.name }),
            ))
        }
        "create_directory" => {
            let name = required(request.name, "name")?;
            let created = gateway.create_directory(&path, &name).await?;
            Ok(Json(
                json!({ "success": true, "path": created.path, "name": created.name }),
            ))
        }
        "save_file" => {
            let path = required(Some(path), "path")?;
            let content = request
                .content
                .ok_or_else(|| Error::BadRequest("content is required".to_string()))?;
            gateway.save_file(&path, &content).await?;
            Ok(Json(json!({ "success": true })))
        }
        "delete" => {
            let path = required(Some(path), "path")?;
            gateway.delete(&path).await?;
            Ok(Json(json!({ "success": true })))
        }
        other => Err(Error::UnknownAction(other.to_string())),
    }
}
