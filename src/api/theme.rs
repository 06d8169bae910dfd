//! `/api/theme`: the effective theme, theme switching, and the system
//! appearance the front-end reports.

use super::settings::blocking;
use super::{json_body, required, AppState};
use crate::config::Theme;
use crate::error::{Error, Result};
use crate::theme::ThemeMode;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeStatus {
    theme: Theme,
    label: &'static str,
    effective: ThemeMode,
    theme_color: &'static str,
}

fn status(state: &AppState) -> ThemeStatus {
    let manager = state.theme_manager();
    ThemeStatus {
        theme: manager.current_theme(),
        label: manager.label(),
        effective: manager.effective(),
        theme_color: manager.theme_color(),
    }
}

pub async fn get_theme(State(state): State<AppState>) -> Json<ThemeStatus> {
    Json(status(&state))
}

#[derive(Debug, Deserialize)]
pub struct ThemeAction {
    action: Option<String>,
}

/// Toggle or cycle the theme preference and persist the result.
pub async fn change_theme(
    State(state): State<AppState>,
    body: std::result::Result<Json<ThemeAction>, JsonRejection>,
) -> Result<Json<ThemeStatus>> {
    let action = required(json_body(body)?.action, "action")?;
    let mut manager = state.theme_manager();
    let theme = match action.as_str() {
        "toggle" => manager.toggle(),
        "cycle" => manager.cycle(),
        _ => return Err(Error::BadRequest("Invalid action".to_string())),
    };

    blocking(state.clone(), move |state| {
        state.preferences.update(|settings| settings.theme = theme)
    })
    .await?;
    Ok(Json(status(&state)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceReport {
    prefers_dark: bool,
}

/// Record the client's `prefers-color-scheme`.
pub async fn set_system_appearance(
    State(state): State<AppState>,
    body: std::result::Result<Json<AppearanceReport>, JsonRejection>,
) -> Result<Json<ThemeStatus>> {
    let report = json_body(body)?;
    state.appearance.set_prefers_dark(report.prefers_dark);
    Ok(Json(status(&state)))
}
