//! Server configuration
//!
//! Values the operator controls rather than the UI: where to listen, the
//! default note root, watcher limits and the PDF renderer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Export Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// PDF rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Explicit browser binary; searched on `PATH` when unset
    pub browser_path: Option<PathBuf>,
    /// Upper bound on a single browser render
    pub render_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            render_timeout_secs: 30,
        }
    }
}

impl ExportConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level server configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_address: String,

    /// Root used when a request does not name one (defaults to the working directory)
    pub default_root: Option<PathBuf>,

    /// Maximum directory depth below a watch root that produces events
    pub watch_depth: usize,

    /// Per-session buffer of undelivered change events
    pub event_buffer: usize,

    /// Initial system appearance until a client reports its own
    pub prefers_dark: bool,

    pub export: ExportConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1:5173"),
            default_root: None,
            watch_depth: 10,
            event_buffer: 256,
            prefers_dark: false,
            export: ExportConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Maximum watch depth.
    pub const MAX_WATCH_DEPTH: usize = 64;
    /// Smallest event buffer accepted.
    pub const MIN_EVENT_BUFFER: usize = 16;
    /// Largest event buffer accepted.
    pub const MAX_EVENT_BUFFER: usize = 65_536;
    /// Shortest PDF render timeout.
    pub const MIN_RENDER_TIMEOUT_SECS: u64 = 1;
    /// Longest PDF render timeout.
    pub const MAX_RENDER_TIMEOUT_SECS: u64 = 300;

    /// Clamp values to valid ranges.
    pub fn sanitize(&mut self) {
        self.watch_depth = self.watch_depth.min(Self::MAX_WATCH_DEPTH);
        self.event_buffer = self
            .event_buffer
            .clamp(Self::MIN_EVENT_BUFFER, Self::MAX_EVENT_BUFFER);
        self.export.render_timeout_secs = self.export.render_timeout_secs.clamp(
            Self::MIN_RENDER_TIMEOUT_SECS,
            Self::MAX_RENDER_TIMEOUT_SECS,
        );
    }

    /// Parse TOML and sanitize.
    pub fn from_toml_sanitized(source: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(source)?;
        config.sanitize();
        Ok(config)
    }

    /// The root used when a request omits one.
    pub fn default_root(&self) -> PathBuf {
        self.default_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
