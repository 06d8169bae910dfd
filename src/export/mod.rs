//! Document Export Module for Marknotes
//!
//! This module exports markdown documents as standalone HTML or PDF.
//!
//! # Architecture
//!
//! - `options.rs` - Export formats, filenames and the exported document
//! - `html.rs` - HTML document generation with the export stylesheet
//! - `pdf.rs` - PDF rendering through a headless browser, with HTML fallback

mod html;
mod options;
mod pdf;

pub use options::ExportFormat;
pub use pdf::{Exporter, PdfRenderer};
