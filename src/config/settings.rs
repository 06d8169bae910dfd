//! User preferences for Marknotes
//!
//! This module defines the `Settings` struct that holds every user-configurable
//! option the note UI persists, with serde support for JSON persistence and
//! field-by-field merging over defaults.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Theme Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Theme preference chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the host's appearance preference
    #[default]
    System,
}

// ─────────────────────────────────────────────────────────────────────────────
// File Tree Spacing
// ─────────────────────────────────────────────────────────────────────────────

/// Row density of the file tree sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileTreeSpacing {
    Compact,
    #[default]
    Normal,
    Comfortable,
}

// ─────────────────────────────────────────────────────────────────────────────
// Editor Appearance
// ─────────────────────────────────────────────────────────────────────────────

/// Editor appearance options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    /// Font size in pixels
    pub font_size: f32,
    /// CSS font-family stack
    pub font_family: String,
    pub show_line_numbers: bool,
    pub word_wrap: bool,
    /// Tab width in spaces
    pub tab_size: u8,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            font_family: String::from("Fira Code, Consolas, Monaco, monospace"),
            show_line_numbers: true,
            word_wrap: true,
            tab_size: 4,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolbar Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// A formatting action that can appear on the editor toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolbarItem {
    Bold,
    Italic,
    Strikethrough,
    Heading,
    Link,
    Code,
    CodeBlock,
    Quote,
    BulletList,
    NumberedList,
    TaskList,
    Table,
    HorizontalRule,
}

impl ToolbarItem {
    /// The default toolbar layout.
    pub fn defaults() -> Vec<ToolbarItem> {
        vec![
            ToolbarItem::Bold,
            ToolbarItem::Italic,
            ToolbarItem::Strikethrough,
            ToolbarItem::Heading,
            ToolbarItem::Link,
            ToolbarItem::Code,
            ToolbarItem::CodeBlock,
            ToolbarItem::Quote,
            ToolbarItem::BulletList,
            ToolbarItem::NumberedList,
            ToolbarItem::TaskList,
        ]
    }
}

/// Editor toolbar configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolbarSettings {
    pub visible: bool,
    /// Items in display order
    pub items: Vec<ToolbarItem>,
}

impl Default for ToolbarSettings {
    fn default() -> Self {
        Self {
            visible: true,
            items: ToolbarItem::defaults(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// The preferences record.
///
/// Serialized as a flat camelCase JSON object with two nested option groups
/// (`editor` and `toolbar`). Every field has a default so that records written
/// by older versions pick up newly introduced options on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Workspace
    // ─────────────────────────────────────────────────────────────────────────
    /// Root directory of the note tree
    pub root_path: PathBuf,

    // ─────────────────────────────────────────────────────────────────────────
    // Appearance
    // ─────────────────────────────────────────────────────────────────────────
    pub theme: Theme,
    pub editor: EditorSettings,
    pub toolbar: ToolbarSettings,
    /// Sidebar width in pixels
    pub sidebar_width: u32,
    pub show_footer: bool,
    pub file_tree_spacing: FileTreeSpacing,
    /// Display format for timestamps
    pub date_time_format: String,

    // ─────────────────────────────────────────────────────────────────────────
    // Behavior
    // ─────────────────────────────────────────────────────────────────────────
    pub ask_before_closing_unsaved_tab: bool,
    pub ask_before_delete_non_empty_folder: bool,
    pub auto_save: bool,
    /// Delay after the last keystroke before auto-saving, in milliseconds
    pub auto_save_delay: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            theme: Theme::default(),
            editor: EditorSettings::default(),
            toolbar: ToolbarSettings::default(),
            sidebar_width: 250,
            show_footer: true,
            file_tree_spacing: FileTreeSpacing::default(),
            date_time_format: String::from("YYYY-MM-DD HH:mm:ss"),
            ask_before_closing_unsaved_tab: true,
            ask_before_delete_non_empty_folder: true,
            auto_save: false,
            auto_save_delay: 2000,
        }
    }
}

impl Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum allowed editor font size.
    pub const MIN_FONT_SIZE: f32 = 8.0;
    /// Maximum allowed editor font size.
    pub const MAX_FONT_SIZE: f32 = 72.0;
    /// Minimum allowed tab size.
    pub const MIN_TAB_SIZE: u8 = 1;
    /// Maximum allowed tab size.
    pub const MAX_TAB_SIZE: u8 = 8;
    /// Minimum sidebar width.
    pub const MIN_SIDEBAR_WIDTH: u32 = 150;
    /// Maximum sidebar width.
    pub const MAX_SIDEBAR_WIDTH: u32 = 800;
    /// Minimum auto-save delay in milliseconds.
    pub const MIN_AUTO_SAVE_DELAY: u64 = 250;

    /// Clamp values to valid ranges.
    ///
    /// Stored records may have been edited by hand or written by another client.
    pub fn sanitize(&mut self) {
        self.editor.font_size = self
            .editor
            .font_size
            .clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);
        self.editor.tab_size = self
            .editor
            .tab_size
            .clamp(Self::MIN_TAB_SIZE, Self::MAX_TAB_SIZE);
        self.sidebar_width = self
            .sidebar_width
            .clamp(Self::MIN_SIDEBAR_WIDTH, Self::MAX_SIDEBAR_WIDTH);
        self.auto_save_delay = self.auto_save_delay.max(Self::MIN_AUTO_SAVE_DELAY);

        // Duplicate toolbar entries would render twice
        let mut seen = Vec::with_capacity(self.toolbar.items.len());
        self.toolbar.items.retain(|item| {
            if seen.contains(item) {
                false
            } else {
                seen.push(*item);
                true
            }
        });
    }

    /// Merge a stored record over the defaults and sanitize the result.
    ///
    /// Stored fields override defaults one by one; nested groups merge one
    /// level deep. A field whose value does not deserialize is skipped with a
    /// warning instead of discarding the whole record.
    pub fn merged_over_defaults(stored: &Value) -> Self {
        let defaults = Settings::default();
        let Some(stored) = stored.as_object() else {
            warn!("Stored preferences are not a JSON object, using defaults");
            return defaults;
        };

        let mut merged = match serde_json::to_value(&defaults) {
            Ok(Value::Object(map)) => map,
            _ => return defaults,
        };

        for (key, value) in stored {
            let candidate = match (merged.get(key), value) {
                (Some(Value::Object(current)), Value::Object(incoming)) => {
                    Value::Object(merge_group(key, current, incoming))
                }
                _ => value.clone(),
            };
            try_apply(&mut merged, key, candidate);
        }

        let mut settings: Settings =
            serde_json::from_value(Value::Object(merged)).unwrap_or(defaults);
        settings.sanitize();
        settings
    }

    /// Parse a stored JSON string and merge it over defaults.
    pub fn from_json_merged(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::merged_over_defaults(&value))
    }

    /// Set a single top-level option from a JSON value.
    ///
    /// Returns an error if the key is unknown or the value has the wrong shape.
    pub fn set_field(&mut self, key: &str, value: Value) -> Result<(), String> {
        let mut map = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("Preferences did not serialize to an object".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        if !map.contains_key(key) {
            return Err(format!("Unknown setting: {}", key));
        }
        map.insert(key.to_string(), value);

        let mut updated: Settings = serde_json::from_value(Value::Object(map))
            .map_err(|e| format!("Invalid value for {}: {}", key, e))?;
        updated.sanitize();
        *self = updated;
        Ok(())
    }
}

/// Merge the fields of one nested option group, skipping ill-typed entries.
fn merge_group(group: &str, current: &Map<String, Value>, incoming: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = current.clone();
    for (key, value) in incoming {
        if !merged.contains_key(key) {
            continue;
        }
        let previous = merged.insert(key.clone(), value.clone());
        let probe = Value::Object(merged.clone());
        let fits = match group {
            "editor" => serde_json::from_value::<EditorSettings>(probe).is_ok(),
            "toolbar" => serde_json::from_value::<ToolbarSettings>(probe).is_ok(),
            _ => true,
        };
        if !fits {
            warn!("Ignoring invalid stored preference {}.{}", group, key);
            if let Some(previous) = previous {
                merged.insert(key.clone(), previous);
            }
        }
    }
    merged
}

/// Apply a top-level field if the record still deserializes afterwards.
fn try_apply(merged: &mut Map<String, Value>, key: &str, candidate: Value) {
    let previous = merged.insert(key.to_string(), candidate);
    if serde_json::from_value::<Settings>(Value::Object(merged.clone())).is_err() {
        warn!("Ignoring invalid stored preference {}", key);
        match previous {
            Some(previous) => {
                merged.insert(key.to_string(), previous);
            }
            None => {
                merged.remove(key);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
