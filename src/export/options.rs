//! Export formats and exported documents.

use crate::files::DOCUMENT_EXTENSION;
use serde::{Deserialize, Serialize};

/// Filename used when the client does not supply one.
pub const DEFAULT_FILENAME: &str = "document.md";

// ─────────────────────────────────────────────────────────────────────────────
// Export Format
// ─────────────────────────────────────────────────────────────────────────────

/// Supported export formats for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Standalone HTML file with embedded styles
    Html,
    /// PDF rendered from the HTML document
    Pdf,
}

impl ExportFormat {
    /// Parse a format name as sent by clients.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "html" => Some(ExportFormat::Html),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

/// Suggested download name: the source name without a trailing document
/// extension, plus the target extension.
pub fn output_filename(source: &str, format: ExportFormat) -> String {
    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    let stem = source.strip_suffix(&suffix).unwrap_or(source);
    format!("{}.{}", stem, format.extension())
}

// ─────────────────────────────────────────────────────────────────────────────
// Exported Document
// ─────────────────────────────────────────────────────────────────────────────

/// A rendered document ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    /// The format actually produced, which may differ from the one requested
    pub format: ExportFormat,
    pub filename: String,
}

impl ExportedDocument {
    pub fn new(bytes: Vec<u8>, format: ExportFormat, source_filename: &str) -> Self {
        Self {
            bytes,
            format,
            filename: output_filename(source_filename, format),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// `Content-Disposition` header value.
    pub fn content_disposition(&self) -> String {
        let safe: String = self
            .filename
            .chars()
            .map(|c| match c {
                '"' | '\\' | '\r' | '\n' => '_',
                c => c,
            })
            .collect();
        format!("attachment; filename=\"{}\"", safe)
    }
}
