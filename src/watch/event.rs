//! Change events pushed to watching clients.

use serde::Serialize;

/// What happened to a watched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A normalized filesystem change below the watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Path relative to the watched root, `/`-separated
    pub path: String,
    pub is_directory: bool,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<String>, is_directory: bool) -> Self {
        Self {
            kind,
            path: path.into(),
            is_directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum FaultTag {
    Error,
}

/// Watcher failure forwarded to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchFault {
    #[serde(rename = "type")]
    tag: FaultTag,
    pub error: String,
}

/// One message on a change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WatchMessage {
    Change(ChangeEvent),
    Error(WatchFault),
}

impl WatchMessage {
    pub fn error(message: impl Into<String>) -> Self {
        WatchMessage::Error(WatchFault {
            tag: FaultTag::Error,
            error: message.into(),
        })
    }

    #[cfg(test)]
    pub(crate) fn as_change(&self) -> Option<&ChangeEvent> {
        match self {
            WatchMessage::Change(event) => Some(event),
            WatchMessage::Error(_) => None,
        }
    }
}

impl From<ChangeEvent> for WatchMessage {
    fn from(event: ChangeEvent) -> Self {
        WatchMessage::Change(event)
    }
}
