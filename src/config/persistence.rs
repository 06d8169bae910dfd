//! Configuration file persistence for Marknotes
//!
//! This module handles loading the server configuration and storing the
//! preferences record in platform-specific directories, with robust error
//! handling and graceful fallback to defaults.

use crate::config::ServerConfig;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used for the config directory
const APP_NAME: &str = "marknotes";

/// Server configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Durable key under which the preferences record is stored
pub const PREFERENCES_KEY: &str = "markdown-notes-settings";

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Directory Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Get the platform-specific configuration directory for the application.
///
/// - **Windows**: `%APPDATA%\marknotes\`
/// - **macOS**: `~/Library/Application Support/marknotes/`
/// - **Linux**: `~/.config/marknotes/`
///
/// # Errors
///
/// Returns `Error::ConfigDirNotFound` if the config directory cannot be determined
/// (e.g., if the HOME environment variable is not set).
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the server configuration file.
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load the server configuration from the default location.
///
/// A missing, empty, or corrupted file yields defaults; corruption is logged.
pub fn load_server_config() -> ServerConfig {
    get_config_file_path()
        .and_then(|path| load_server_config_from(&path))
        .unwrap_or_warn_default(ServerConfig::default(), "Failed to load server configuration")
}

/// Load the server configuration from an explicit path.
pub fn load_server_config_from(path: &Path) -> Result<ServerConfig> {
    if !path.exists() {
        debug!("Config file not found at {}, using defaults", path.display());
        return Ok(ServerConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        debug!("Config file is empty, using defaults");
        return Ok(ServerConfig::default());
    }

    let config = ServerConfig::from_toml_sanitized(&contents)?;
    info!("Configuration loaded successfully from {}", path.display());
    Ok(config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Preference Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Durable key-value storage for serialized preference records.
pub trait PreferenceStorage: Send + Sync {
    /// Read the raw value stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the value stored under `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stores each key as `<key>.json` inside a directory.
///
/// Each write goes to its own uniquely named temporary sibling and is then
/// renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage rooted at the platform configuration directory.
    pub fn in_config_dir() -> Result<Self> {
        Ok(Self::new(get_config_dir()?))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            debug!("Creating config directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir).map_err(|e| Error::ConfigSave {
                path: self.dir.clone(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

impl PreferenceStorage for JsonFileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| Error::ConfigLoad {
            path: path.clone(),
            source: Box::new(e),
        })?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(contents))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_dir()?;
        let path = self.path_for(key);
        let save_error = |e: std::io::Error| Error::ConfigSave {
            path: path.clone(),
            source: Box::new(e),
        };

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(save_error)?;
        temp.write_all(value.as_bytes()).map_err(save_error)?;
        temp.flush().map_err(save_error)?;
        temp.persist(&path).map_err(|e| save_error(e.error))?;

        debug!("Stored {} at {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::ConfigSave {
                path,
                source: Box::new(e),
            }),
        }
    }
}

/// In-memory storage, used when no config directory is available and in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one value.
    #[cfg(test)]
    pub(crate) fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        storage
    }
}

impl PreferenceStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
