//! `/api/settings`: read and change the preferences record.
//!
//! Storage writes are blocking, so mutations run on the blocking pool.

use super::{json_body, required, AppState};
use crate::config::Settings;
use crate::error::{Error, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.preferences.current())
}

/// Replace the record. Missing fields take their defaults.
pub async fn replace_settings(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Settings>> {
    let record = json_body(body)?;
    let settings = Settings::merged_over_defaults(&record);
    blocking(state, move |state| state.preferences.save(settings))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct SettingUpdate {
    key: Option<String>,
    value: Option<Value>,
}

/// Set one option by key.
pub async fn update_setting(
    State(state): State<AppState>,
    body: std::result::Result<Json<SettingUpdate>, JsonRejection>,
) -> Result<Json<Settings>> {
    let update = json_body(body)?;
    let key = required(update.key, "key")?;
    let value = update
        .value
        .ok_or_else(|| Error::BadRequest("value is required".to_string()))?;
    blocking(state, move |state| state.preferences.update_setting(&key, value))
        .await
        .map(Json)
}

/// Forget the stored record and return the defaults.
pub async fn reset_settings(State(state): State<AppState>) -> Result<Json<Settings>> {
    blocking(state, |state| state.preferences.reset())
        .await
        .map(Json)
}

/// Run a preference mutation on the blocking pool.
pub(super) async fn blocking<T, F>(state: AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| Error::Application(format!("Preference task failed: {}", e)))?
}
