//! `/api/watch`: start and stop watch sessions, and stream their changes as
//! server-sent events.

use super::{json_body, required, AppState};
use crate::error::{Error, Result};
use crate::watch::ChangeStream;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, StreamExt};
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchControl {
    #[serde(default)]
    action: String,
    root_path: Option<String>,
    client_id: Option<String>,
}

/// `start` or `stop` the session for a client.
pub async fn control(
    State(state): State<AppState>,
    body: std::result::Result<Json<WatchControl>, JsonRejection>,
) -> Result<Json<Value>> {
    let request = json_body(body)?;

    match request.action.as_str() {
        "start" => {
            let client_id = required(request.client_id, "clientId")?;
            let root = state.root_or_default(request.root_path.as_deref());
            state.sessions.start(&client_id, &root).await?;
        }
        "stop" => {
            let client_id = required(request.client_id, "clientId")?;
            state.sessions.stop(&client_id);
        }
        _ => return Err(Error::BadRequest("Invalid action".to_string())),
    }

    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    client_id: Option<String>,
}

/// Attach to a session and stream its changes until it ends or the client
/// goes away.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse> {
    let client_id = query.client_id.unwrap_or_default();
    let changes = state.sessions.attach(&client_id)?;

    let events = stream::unfold(changes, |mut changes: ChangeStream| async move {
        changes.next().await.map(|message| (message, changes))
    })
    .filter_map(|message| async move {
        match Event::default().json_data(&message) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!("Skipping change event that failed to serialize: {}", e);
                None
            }
        }
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Cache-Control"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stream_without_session_is_not_found() {
        let temp = TempDir::new().unwrap();
        let app = router(state(temp.path()));

        let (status, response) = send(app, get("/api/watch?clientId=nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "No active watcher"})
        );
    }

    #[tokio::test]
    async fn test_start_stream_and_stop() {
        let temp = TempDir::new().unwrap();
        let state = state(temp.path());
        let app = router(state.clone());

        let (status, response) = send(
            app.clone(),
            json_request(
                "POST",
                "/api/watch",
                json!({"action": "start", "clientId": "c1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"success": true}));
        assert!(state.sessions.is_active("c1"));

        let (status, response) = send(app.clone(), get("/api/watch?clientId=c1")).await;
        assert_eq!(status, StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-headers"], "Cache-Control");

        let (status, _) = send(
            app,
            json_request(
                "POST",
                "/api/watch",
                json!({"action": "stop", "clientId": "c1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.sessions.is_active("c1"));

        // Session gone, so the open stream ends
        drop(response);
    }

    #[tokio::test]
    async fn test_start_missing_root_is_not_found() {
        let temp = TempDir::new().unwrap();
        let app = router(state(temp.path()));

        let (status, _) = send(
            app,
            json_request(
                "POST",
                "/api/watch",
                json!({
                    "action": "start",
                    "clientId": "c1",
                    "rootPath": temp.path().join("missing").to_string_lossy(),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_action_and_missing_client() {
        let temp = TempDir::new().unwrap();
        let app = router(state(temp.path()));

        let (status, response) = send(
            app.clone(),
            json_request("POST", "/api/watch", json!({"action": "pause", "clientId": "c1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid action"}));

        let (status, _) = send(
            app,
            json_request("POST", "/api/watch", json!({"action": "start"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
