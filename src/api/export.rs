//! `/api/export`: download a note as HTML or PDF.

use super::{json_body, AppState};
use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::files::FileGateway;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    format: Option<String>,
    content: Option<String>,
    filename: Option<String>,
    path: Option<String>,
    root_path: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    body: std::result::Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(body)?;

    let format_name = request.format.filter(|f| !f.is_empty());
    let content = request.content.filter(|c| !c.is_empty());
    let (format_name, content, filename) = match (format_name, content, request.path) {
        (Some(format), Some(content), _) => (format, content, request.filename),
        (Some(format), None, Some(path)) if !path.is_empty() => {
            let gateway =
                FileGateway::open(state.root_or_default(request.root_path.as_deref())).await?;
            let file = gateway.read(&path).await?;
            let filename = request.filename.or_else(|| {
                Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            });
            (format, file.content, filename)
        }
        _ => {
            return Err(Error::BadRequest(
                "Format and content are required".to_string(),
            ))
        }
    };

    let format = ExportFormat::parse(&format_name)
        .ok_or_else(|| Error::BadRequest("Unsupported format".to_string()))?;

    let document = state
        .exporter
        .export(&content, filename.as_deref(), format)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, document.content_type().to_string()),
            (header::CONTENT_DISPOSITION, document.content_disposition()),
        ],
        document.bytes,
    )
        .into_response())
}
