//! Theme resolution for Marknotes
//!
//! The `Theme` preference in `config::settings` (Light/Dark/System) selects a
//! concrete [`ThemeMode`] at runtime. `System` follows a [`SystemAppearance`]
//! source, which the front-end keeps current by reporting its
//! `prefers-color-scheme` media query.
//!
//! # Usage
//!
//! ```ignore
//! use crate::theme::{resolve_theme, watch_system_theme, SystemAppearance};
//!
//! let appearance = SystemAppearance::new(false);
//! let handle = watch_system_theme(&appearance, |mode| println!("now {}", mode));
//! appearance.set_prefers_dark(true);
//! handle.teardown();
//! ```

pub mod manager;

pub use manager::{watch_system_theme, ThemeManager, ThemeWatchHandle};

use crate::config::Theme;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

// ─────────────────────────────────────────────────────────────────────────────
// Theme Mode
// ─────────────────────────────────────────────────────────────────────────────

/// The concrete mode a theme preference resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    /// Value for `<meta name="theme-color">`.
    pub fn theme_color(&self) -> &'static str {
        match self {
            ThemeMode::Light => "#ffffff",
            ThemeMode::Dark => "#1f2937",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeMode::Light => write!(f, "light"),
            ThemeMode::Dark => write!(f, "dark"),
        }
    }
}

/// Resolve a theme preference against the system appearance.
pub fn resolve_theme(theme: Theme, system_prefers_dark: bool) -> ThemeMode {
    match theme {
        Theme::Light => ThemeMode::Light,
        Theme::Dark => ThemeMode::Dark,
        Theme::System if system_prefers_dark => ThemeMode::Dark,
        Theme::System => ThemeMode::Light,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// System Appearance
// ─────────────────────────────────────────────────────────────────────────────

/// The host's light/dark appearance preference, observable for changes.
#[derive(Debug, Clone)]
pub struct SystemAppearance {
    prefers_dark: watch::Sender<bool>,
}

impl SystemAppearance {
    pub fn new(prefers_dark: bool) -> Self {
        let (prefers_dark, _) = watch::channel(prefers_dark);
        Self { prefers_dark }
    }

    pub fn prefers_dark(&self) -> bool {
        *self.prefers_dark.borrow()
    }

    /// Record a new appearance. Subscribers are only woken on an actual change.
    pub fn set_prefers_dark(&self, dark: bool) {
        self.prefers_dark.send_if_modified(|current| {
            if *current == dark {
                false
            } else {
                *current = dark;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.prefers_dark.subscribe()
    }
}

impl Default for SystemAppearance {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_explicit_themes_ignore_system() {
        assert_eq!(resolve_theme(Theme::Light, true), ThemeMode::Light);
        assert_eq!(resolve_theme(Theme::Dark, false), ThemeMode::Dark);
    }

    #[test]
    fn test_resolve_system_follows_appearance() {
        assert_eq!(resolve_theme(Theme::System, true), ThemeMode::Dark);
        assert_eq!(resolve_theme(Theme::System, false), ThemeMode::Light);
    }

    #[test]
    fn test_theme_colors() {
        assert_eq!(ThemeMode::Dark.theme_color(), "#1f2937");
        assert_eq!(ThemeMode::Light.theme_color(), "#ffffff");
    }

    #[test]
    fn test_appearance_only_notifies_on_change() {
        let appearance = SystemAppearance::new(false);
        let mut receiver = appearance.subscribe();

        appearance.set_prefers_dark(false);
        assert!(!receiver.has_changed().unwrap());

        appearance.set_prefers_dark(true);
        assert!(receiver.has_changed().unwrap());
        assert!(*receiver.borrow_and_update());
        assert!(appearance.prefers_dark());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(ThemeMode::Dark.to_string(), "dark");
        assert_eq!(ThemeMode::Light.to_string(), "light");
    }
}
