//! Markdown to HTML rendering using comrak
//!
//! Parses to an AST, swaps fenced code blocks for highlighted HTML, then
//! formats the tree.

use super::syntax::get_highlighter;
use crate::error::{Error, Result};
use comrak::nodes::{NodeHtmlBlock, NodeValue};
use comrak::{format_html, parse_document, Arena, Options};

/// Configuration options for markdown rendering.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Enable GitHub Flavored Markdown tables
    pub tables: bool,
    /// Enable strikethrough syntax (~~text~~)
    pub strikethrough: bool,
    /// Enable autolink URLs and emails
    pub autolink: bool,
    /// Enable task lists (- [ ] and - [x])
    pub tasklist: bool,
    /// Enable footnotes
    pub footnotes: bool,
    /// Render single newlines as `<br>`
    pub hard_breaks: bool,
    /// Highlight fenced code with syntect
    pub highlight_code: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            autolink: true,
            tasklist: true,
            footnotes: true,
            hard_breaks: true,
            highlight_code: true,
        }
    }
}

impl MarkdownOptions {
    fn to_comrak_options(&self) -> Options {
        let mut options = Options::default();

        options.extension.strikethrough = self.strikethrough;
        options.extension.table = self.tables;
        options.extension.autolink = self.autolink;
        options.extension.tasklist = self.tasklist;
        options.extension.footnotes = self.footnotes;
        options.extension.header_ids = Some(String::new());

        options.render.hardbreaks = self.hard_breaks;
        // Raw HTML passes through; highlighted code is injected as HTML blocks
        options.render.unsafe_ = true;

        options
    }
}

/// Render markdown to an HTML fragment with default options.
pub fn render_to_html(markdown: &str) -> Result<String> {
    render_to_html_with_options(markdown, &MarkdownOptions::default())
}

pub fn render_to_html_with_options(markdown: &str, options: &MarkdownOptions) -> Result<String> {
    let arena = Arena::new();
    let comrak_options = options.to_comrak_options();
    let root = parse_document(&arena, markdown, &comrak_options);

    if options.highlight_code {
        let highlighter = get_highlighter();
        for node in root.descendants() {
            let mut ast = node.data.borrow_mut();
            let highlighted = match &ast.value {
                NodeValue::CodeBlock(block) => {
                    let language = block.info.split_whitespace().next();
                    Some(highlighter.highlight_to_html(&block.literal, language))
                }
                _ => None,
            };
            if let Some(literal) = highlighted {
                ast.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                    block_type: 0,
                    literal,
                });
            }
        }
    }

    let mut html = Vec::new();
    format_html(root, &comrak_options, &mut html)
        .map_err(|e| Error::Export(format!("Failed to format HTML: {}", e)))?;
    String::from_utf8(html).map_err(|e| Error::Export(format!("Rendered HTML is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph() {
        let html = render_to_html("# Hello\n\nWorld").unwrap();
        assert!(html.contains("<h1"));
        assert!(html.contains("Hello"));
        assert!(html.contains("<p>World</p>"));
    }

    #[test]
    fn test_hard_breaks() {
        let html = render_to_html("line one\nline two").unwrap();
        assert!(html.contains("<br"));

        let options = MarkdownOptions {
            hard_breaks: false,
            ..Default::default()
        };
        let html = render_to_html_with_options("line one\nline two", &options).unwrap();
        assert!(!html.contains("<br"));
    }

    #[test]
    fn test_gfm_extensions() {
        let markdown = "~~gone~~\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n";
        let html = render_to_html(markdown).unwrap();
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = render_to_html("```rust\nlet x = 1;\n```\n").unwrap();
        assert!(html.contains("language-rust"));
        assert!(html.contains("<span style="));
    }

    #[test]
    fn test_unknown_fence_language_falls_back() {
        let html = render_to_html("```nonsense\na < b\n```\n").unwrap();
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_highlighting_can_be_disabled() {
        let options = MarkdownOptions {
            highlight_code: false,
            ..Default::default()
        };
        let html = render_to_html_with_options("```rust\nlet x = 1;\n```\n", &options).unwrap();
        assert!(!html.contains("<span style="));
        assert!(html.contains("let x = 1;"));
    }
}
