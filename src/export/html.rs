//! HTML Export Generation
//!
//! This module generates complete HTML documents from markdown content,
//! with an inlined stylesheet for standalone viewing and printing.

use crate::error::Result;
use crate::markdown::{html_escape, render_to_html};

// ─────────────────────────────────────────────────────────────────────────────
// HTML Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a complete HTML document from markdown content.
///
/// `title` is escaped into the `<title>` element.
pub fn generate_html_document(markdown: &str, title: &str) -> Result<String> {
    let body = render_to_html(markdown)?;

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="generator" content="Marknotes">
    <title>{title}</title>
    <style>
{css}
    </style>
</head>
<body>
    <article class="markdown-body">
{body}
    </article>
</body>
</html>"#,
        title = html_escape(title),
        css = EXPORT_CSS,
        body = body,
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// CSS
// ─────────────────────────────────────────────────────────────────────────────

/// Stylesheet for exported documents, including print rules.
const EXPORT_CSS: &str = r#"
*, *::before, *::after {
    box-sizing: border-box;
}

body {
    margin: 0 auto;
    padding: 2rem;
    max-width: 800px;
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', 'Helvetica Neue', sans-serif;
    line-height: 1.6;
    color: #333;
    background-color: #fff;
}

h1, h2, h3, h4, h5, h6 {
    margin-top: 2rem;
    margin-bottom: 1rem;
    font-weight: 600;
    line-height: 1.25;
}

h1 { font-size: 2rem; border-bottom: 1px solid #e1e4e8; padding-bottom: 0.5rem; }
h2 { font-size: 1.5rem; border-bottom: 1px solid #e1e4e8; padding-bottom: 0.3rem; }
h3 { font-size: 1.25rem; }

p { margin-bottom: 1rem; }

ul, ol {
    margin-bottom: 1rem;
    padding-left: 2rem;
}

li { margin-bottom: 0.25rem; }

blockquote {
    margin: 1rem 0;
    padding: 0 1rem;
    border-left: 4px solid #e1e4e8;
    color: #586069;
}

code {
    background-color: #f6f8fa;
    padding: 0.2rem 0.4rem;
    border-radius: 3px;
    font-family: 'SFMono-Regular', 'Consolas', 'Liberation Mono', 'Menlo', monospace;
    font-size: 0.875rem;
}

pre {
    background-color: #f6f8fa;
    padding: 1rem;
    border-radius: 6px;
    overflow-x: auto;
    margin: 1rem 0;
}

pre code {
    background-color: transparent;
    padding: 0;
}

table {
    border-collapse: collapse;
    width: 100%;
    margin: 1rem 0;
}

th, td {
    border: 1px solid #e1e4e8;
    padding: 0.5rem;
    text-align: left;
}

th {
    background-color: #f6f8fa;
    font-weight: 600;
}

a {
    color: #0366d6;
    text-decoration: none;
}

a:hover { text-decoration: underline; }

img {
    max-width: 100%;
    height: auto;
}

hr {
    border: none;
    border-top: 1px solid #e1e4e8;
    margin: 2rem 0;
}

.task-list-item { list-style-type: none; }
.task-list-item input[type="checkbox"] { margin-right: 0.5rem; }

del { color: #586069; }

@page {
    size: A4;
    margin: 1cm;
}

@media print {
    body {
        padding: 1rem;
        -webkit-print-color-adjust: exact;
        print-color-adjust: exact;
    }

    h1, h2, h3, h4, h5, h6 { page-break-after: avoid; }
    pre, blockquote { page-break-inside: avoid; }
}
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
