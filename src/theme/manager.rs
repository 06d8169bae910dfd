//! Theme Manager for Marknotes
//!
//! Centralizes the theme preference, resolves it against the system
//! appearance, and follows appearance changes for `System`.

use log::{debug, info};
use tokio::task::JoinHandle;

use super::{resolve_theme, SystemAppearance, ThemeMode};
use crate::config::Theme;

// ─────────────────────────────────────────────────────────────────────────────
// Following the System Appearance
// ─────────────────────────────────────────────────────────────────────────────

/// Handle returned by [`watch_system_theme`]. Tearing it down (or dropping it)
/// stops further callbacks.
#[derive(Debug)]
pub struct ThemeWatchHandle {
    task: JoinHandle<()>,
}

impl ThemeWatchHandle {
    /// Unsubscribe from appearance changes.
    pub fn teardown(self) {
        // Drop aborts the task
    }
}

impl Drop for ThemeWatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Invoke `callback` with the resolved mode every time the system appearance
/// changes. Must be called from within a tokio runtime.
pub fn watch_system_theme<F>(appearance: &SystemAppearance, mut callback: F) -> ThemeWatchHandle
where
    F: FnMut(ThemeMode) + Send + 'static,
{
    // A fresh receiver treats the current value as already seen
    let mut receiver = appearance.subscribe();

    let task = tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let dark = *receiver.borrow_and_update();
            let mode = resolve_theme(Theme::System, dark);
            debug!("System appearance changed, theme now {}", mode);
            callback(mode);
        }
    });

    ThemeWatchHandle { task }
}

// ─────────────────────────────────────────────────────────────────────────────
// Theme Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Manages the theme preference and its effective mode.
#[derive(Debug, Clone)]
pub struct ThemeManager {
    /// Current theme setting (Light, Dark, or System)
    current_theme: Theme,
    /// Source consulted when the setting is System
    appearance: SystemAppearance,
}

impl ThemeManager {
    pub fn new(theme: Theme, appearance: SystemAppearance) -> Self {
        debug!("ThemeManager created with theme: {:?}", theme);
        Self {
            current_theme: theme,
            appearance,
        }
    }

    /// Get the current theme setting.
    pub fn current_theme(&self) -> Theme {
        self.current_theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.current_theme != theme {
            info!("Theme changed from {:?} to {:?}", self.current_theme, theme);
            self.current_theme = theme;
        }
    }

    /// Toggle between Light and Dark themes.
    ///
    /// If System is currently selected, switches to Dark.
    pub fn toggle(&mut self) -> Theme {
        let new_theme = match self.current_theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
            Theme::System => Theme::Dark,
        };
        self.set_theme(new_theme);
        new_theme
    }

    /// Cycle Light → Dark → System → Light.
    pub fn cycle(&mut self) -> Theme {
        let new_theme = match self.current_theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::System,
            Theme::System => Theme::Light,
        };
        self.set_theme(new_theme);
        new_theme
    }

    /// The effective mode right now.
    pub fn effective(&self) -> ThemeMode {
        resolve_theme(self.current_theme, self.appearance.prefers_dark())
    }

    /// Value for `<meta name="theme-color">` under the effective mode.
    pub fn theme_color(&self) -> &'static str {
        self.effective().theme_color()
    }

    /// Get a display label for the current theme.
    pub fn label(&self) -> &'static str {
        match self.current_theme {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
            Theme::System => "System",
        }
    }

    /// Get a tooltip describing the current theme.
    pub fn tooltip(&self) -> String {
        match self.current_theme {
            Theme::Light => "Light theme".to_string(),
            Theme::Dark => "Dark theme".to_string(),
            Theme::System => format!("System theme (currently {})", self.effective()),
        }
    }

    /// Follow system appearance changes when the preference is System.
    ///
    /// Returns `None` for explicit themes, which never change on their own.
    pub fn follow<F>(&self, callback: F) -> Option<ThemeWatchHandle>
    where
        F: FnMut(ThemeMode) + Send + 'static,
    {
        match self.current_theme {
            Theme::System => Some(watch_system_theme(&self.appearance, callback)),
            Theme::Light | Theme::Dark => None,
        }
    }
}

impl Default for ThemeManager {
    fn default() -> Self {
        Self::new(Theme::default(), SystemAppearance::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_theme_manager_default() {
        let manager = ThemeManager::default();
        assert_eq!(manager.current_theme(), Theme::System);
        assert_eq!(manager.effective(), ThemeMode::Light);
    }

    #[test]
    fn test_theme_manager_toggle() {
        let mut manager = ThemeManager::new(Theme::Light, SystemAppearance::default());

        assert_eq!(manager.toggle(), Theme::Dark);
        assert_eq!(manager.current_theme(), Theme::Dark);
        assert_eq!(manager.toggle(), Theme::Light);
    }

    #[test]
    fn test_theme_manager_toggle_from_system() {
        let mut manager = ThemeManager::new(Theme::System, SystemAppearance::default());
        assert_eq!(manager.toggle(), Theme::Dark);
    }

    #[test]
    fn test_theme_manager_cycle() {
        let mut manager = ThemeManager::new(Theme::Light, SystemAppearance::default());
        assert_eq!(manager.cycle(), Theme::Dark);
        assert_eq!(manager.cycle(), Theme::System);
        assert_eq!(manager.cycle(), Theme::Light);
    }

    #[test]
    fn test_effective_follows_appearance() {
        let appearance = SystemAppearance::new(false);
        let manager = ThemeManager::new(Theme::System, appearance.clone());
        assert_eq!(manager.effective(), ThemeMode::Light);

        appearance.set_prefers_dark(true);
        assert_eq!(manager.effective(), ThemeMode::Dark);
        assert_eq!(manager.theme_color(), "#1f2937");
        assert_eq!(manager.tooltip(), "System theme (currently dark)");
    }

    #[test]
    fn test_labels() {
        let mut manager = ThemeManager::new(Theme::Light, SystemAppearance::default());
        assert_eq!(manager.label(), "Light");
        manager.set_theme(Theme::Dark);
        assert_eq!(manager.label(), "Dark");
        manager.set_theme(Theme::System);
        assert_eq!(manager.label(), "System");
    }

    #[tokio::test]
    async fn test_watch_system_theme_invokes_callback() {
        let appearance = SystemAppearance::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = watch_system_theme(&appearance, move |mode| {
            let _ = tx.send(mode);
        });

        appearance.set_prefers_dark(true);
        let mode = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mode, ThemeMode::Dark);

        appearance.set_prefers_dark(false);
        let mode = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mode, ThemeMode::Light);

        handle.teardown();
    }

    #[tokio::test]
    async fn test_teardown_stops_callbacks() {
        let appearance = SystemAppearance::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = watch_system_theme(&appearance, move |mode| {
            let _ = tx.send(mode);
        });

        handle.teardown();
        appearance.set_prefers_dark(true);

        // The callback (and its sender) is dropped with the aborted task
        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_follow_only_for_system() {
        let manager = ThemeManager::new(Theme::Dark, SystemAppearance::default());
        assert!(manager.follow(|_| {}).is_none());

        let manager = ThemeManager::new(Theme::System, SystemAppearance::default());
        let handle = manager.follow(|_| {});
        assert!(handle.is_some());
    }
}
