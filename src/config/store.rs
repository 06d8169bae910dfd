//! Preference store
//!
//! Holds the current preferences record in memory, publishes every change to
//! subscribers, and writes through to a [`PreferenceStorage`].

use crate::config::{PreferenceStorage, Settings, PREFERENCES_KEY};
use crate::error::{Error, Result};
use log::{info, warn};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// State container for the preferences record.
pub struct PreferenceStore {
    storage: Box<dyn PreferenceStorage>,
    current: watch::Sender<Settings>,
    /// Serializes read-modify-write cycles and storage writes
    writes: Mutex<()>,
}

impl PreferenceStore {
    /// Create a store initialized from defaults. Call [`load`](Self::load) to
    /// pick up the durable record.
    pub fn new(storage: Box<dyn PreferenceStorage>) -> Self {
        let (current, _) = watch::channel(Settings::default());
        Self {
            storage,
            current,
            writes: Mutex::new(()),
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A snapshot of the current record.
    pub fn current(&self) -> Settings {
        self.current.borrow().clone()
    }

    /// Subscribe to changes. The receiver sees the current value immediately.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    /// Merge the durable record over defaults and make it current.
    ///
    /// Unreadable or unparseable storage leaves the defaults in place.
    pub fn load(&self) -> Settings {
        let settings = match self.storage.read(PREFERENCES_KEY) {
            Ok(Some(raw)) => match Settings::from_json_merged(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Error loading preferences: {}. Using defaults.", e);
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Error reading preferences: {}. Using defaults.", e);
                Settings::default()
            }
        };

        self.current.send_replace(settings.clone());
        settings
    }

    /// Persist a full record and make it current.
    pub fn save(&self, settings: Settings) -> Result<Settings> {
        let _guard = self.write_guard();
        self.commit(settings)
    }

    /// Apply a change to the current record and persist the result.
    pub fn update<F>(&self, change: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_guard();
        let mut next = self.current();
        change(&mut next);
        self.commit(next)
    }

    /// Set one top-level option by its camelCase key.
    pub fn update_setting(&self, key: &str, value: Value) -> Result<Settings> {
        let _guard = self.write_guard();
        let mut next = self.current();
        next.set_field(key, value).map_err(Error::BadRequest)?;
        self.commit(next)
    }

    /// Clear durable storage and revert to defaults.
    pub fn reset(&self) -> Result<Settings> {
        let _guard = self.write_guard();
        self.storage.remove(PREFERENCES_KEY)?;
        let defaults = Settings::default();
        self.current.send_replace(defaults.clone());
        info!("Preferences reset to defaults");
        Ok(defaults)
    }

    /// Persist and publish. Callers hold the write guard.
    fn commit(&self, mut settings: Settings) -> Result<Settings> {
        settings.sanitize();
        self.persist(&settings)?;
        self.current.send_replace(settings.clone());
        info!("Preferences saved");
        Ok(settings)
    }

    fn persist(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        self.storage.write(PREFERENCES_KEY, &json)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
