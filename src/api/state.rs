//! Shared application state for the HTTP handlers.

use crate::config::{PreferenceStore, ServerConfig};
use crate::export::Exporter;
use crate::theme::{SystemAppearance, ThemeManager};
use crate::watch::SessionManager;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the handlers share.
pub struct AppStateInner {
    pub config: ServerConfig,
    pub sessions: Arc<SessionManager>,
    pub exporter: Exporter,
    pub preferences: PreferenceStore,
    pub appearance: SystemAppearance,
}

/// Cheaply clonable handle to [`AppStateInner`] for axum.
#[derive(Clone)]
pub struct AppState(pub Arc<AppStateInner>);

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        exporter: Exporter,
        preferences: PreferenceStore,
        appearance: SystemAppearance,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(config.watch_depth, config.event_buffer));
        Self(Arc::new(AppStateInner {
            config,
            sessions,
            exporter,
            preferences,
            appearance,
        }))
    }

    /// The root to use when a request names none.
    pub fn root_or_default(&self, requested: Option<&str>) -> PathBuf {
        match requested.filter(|r| !r.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => self.config.default_root(),
        }
    }

    /// Theme manager for the current preference and system appearance.
    pub fn theme_manager(&self) -> ThemeManager {
        ThemeManager::new(self.preferences.current().theme, self.appearance.clone())
    }
}
