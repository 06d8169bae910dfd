//! Markdown rendering module
//!
//! This module renders markdown to HTML using comrak, a CommonMark + GFM
//! compatible parser, with syntect highlighting for fenced code.
//!
//! # Example
//! ```ignore
//! use crate::markdown::render_to_html;
//!
//! let html = render_to_html("# Hello\n\nThis is **bold** text.")?;
//! ```

mod render;
mod syntax;

pub use render::render_to_html;
pub use syntax::html_escape;
