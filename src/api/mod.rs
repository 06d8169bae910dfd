//! HTTP surface for Marknotes
//!
//! An axum router over the filesystem gateway, watch sessions, export,
//! folder browsing, preferences and theme. Every error body is
//! `{"error": "<message>"}`.

mod browse;
mod export;
mod files;
mod health;
mod settings;
mod state;
mod theme;
mod watch;

pub use state::{AppState, AppStateInner};

use crate::error::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::error;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/files", get(files::get_files).post(files::post_files))
        .route("/api/watch", get(watch::stream).post(watch::control))
        .route("/api/export", post(export::export))
        .route("/api/browse-folder", get(browse::browse))
        .route("/api/health", get(health::health))
        .route(
            "/api/settings",
            get(settings::get_settings)
                .put(settings::replace_settings)
                .patch(settings::update_setting)
                .delete(settings::reset_settings),
        )
        .route("/api/theme", get(theme::get_theme).post(theme::change_theme))
        .route("/api/theme/system", post(theme::set_system_appearance))
        .layer(cors)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Responses
// ─────────────────────────────────────────────────────────────────────────────

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::BadRequest(_) | Error::UnknownAction(_) | Error::NotADirectory(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::WatchNotFound(_) | Error::WatchRootMissing(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Unwrap a JSON body, turning a malformed one into a bad request.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    body.map(|Json(value)| value)
        .map_err(|rejection| Error::BadRequest(rejection.body_text()))
}

/// Require an optional request field to be present and non-empty.
fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::BadRequest(format!("{} is required", field)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────
