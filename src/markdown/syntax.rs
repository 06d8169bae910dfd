//! Syntax Highlighting Module
//!
//! This module integrates syntect for fenced code blocks in exported
//! documents. Highlighting is emitted as HTML with inline styles so the
//! exported file needs no external stylesheet.

use log::{debug, warn};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Theme used for exported code blocks (exports are always light)
pub const EXPORT_THEME: &str = "InspiredGitHub";

/// Fallback theme if the export theme is not bundled
pub const FALLBACK_THEME: &str = "base16-ocean.light";

// ─────────────────────────────────────────────────────────────────────────────
// Syntax Highlighter
// ─────────────────────────────────────────────────────────────────────────────

/// Syntax highlighter that caches syntect sets for performance.
///
/// Loading the sets is expensive; use [`get_highlighter`] to share one.
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        debug!("Loading syntect syntax and theme sets");
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();
        debug!(
            "Loaded {} syntaxes and {} themes",
            syntax_set.syntaxes().len(),
            theme_set.themes.len()
        );
        Self {
            syntax_set,
            theme_set,
        }
    }

    fn theme(&self) -> Option<&Theme> {
        self.theme_set
            .themes
            .get(EXPORT_THEME)
            .or_else(|| self.theme_set.themes.get(FALLBACK_THEME))
    }

    /// Whether `language` names a known syntax.
    #[cfg(test)]
    pub(crate) fn supports(&self, language: &str) -> bool {
        self.find_syntax_for_language(language).is_some()
    }

    /// Render a code block as a `<pre><code>` element.
    ///
    /// Unknown or missing languages produce escaped plain text.
    pub fn highlight_to_html(&self, code: &str, language: Option<&str>) -> String {
        let language = language.map(str::trim).filter(|l| !l.is_empty());
        let class = language
            .map(|l| format!(" class=\"language-{}\"", html_escape(l)))
            .unwrap_or_default();

        let highlighted = language
            .and_then(|l| self.find_syntax_for_language(l))
            .and_then(|syntax| self.theme().map(|theme| (syntax, theme)))
            .and_then(|(syntax, theme)| self.highlight_lines(code, syntax, theme));

        match highlighted {
            Some((body, background)) => format!(
                "<pre class=\"highlight\" style=\"background-color:{};\"><code{}>{}</code></pre>\n",
                background, class, body
            ),
            None => {
                if let Some(language) = language {
                    debug!("No syntax found for language: {}", language);
                }
                format!("<pre><code{}>{}</code></pre>\n", class, html_escape(code))
            }
        }
    }

    /// Highlight every line, or `None` if any line fails.
    fn highlight_lines(
        &self,
        code: &str,
        syntax: &SyntaxReference,
        theme: &Theme,
    ) -> Option<(String, String)> {
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut body = String::with_capacity(code.len() * 2);

        for line in LinesWithEndings::from(code) {
            let ranges = match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => ranges,
                Err(e) => {
                    warn!("Failed to highlight line: {}", e);
                    return None;
                }
            };
            match styled_line_to_highlighted_html(&ranges, IncludeBackground::No) {
                Ok(html) => body.push_str(&html),
                Err(e) => {
                    warn!("Failed to render highlighted line: {}", e);
                    return None;
                }
            }
        }

        let background = theme
            .settings
            .background
            .map(|c| format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b))
            .unwrap_or_else(|| "#f6f8fa".to_string());
        Some((body, background))
    }

    /// Find syntax definition for a language identifier.
    ///
    /// Tries the alias table, then the syntax name, then a case-insensitive
    /// name match.
    fn find_syntax_for_language(&self, language: &str) -> Option<&SyntaxReference> {
        if language.is_empty() {
            return None;
        }

        let lang_lower = language.to_lowercase();

        let extension = match lang_lower.as_str() {
            "rust" | "rs" => "rs",
            "python" | "py" => "py",
            "javascript" | "js" | "jsx" => "js",
            "typescript" | "ts" | "tsx" => "ts",
            "c" => "c",
            "cpp" | "c++" | "cxx" => "cpp",
            "csharp" | "c#" | "cs" => "cs",
            "java" => "java",
            "go" | "golang" => "go",
            "ruby" | "rb" => "rb",
            "php" => "php",
            "scala" => "scala",
            "html" | "htm" => "html",
            "css" => "css",
            "json" => "json",
            "yaml" | "yml" => "yaml",
            "xml" => "xml",
            "markdown" | "md" => "md",
            "sql" => "sql",
            "shell" | "sh" | "bash" | "zsh" => "sh",
            "makefile" | "make" => "Makefile",
            "lua" => "lua",
            "perl" | "pl" => "pl",
            "r" => "r",
            "haskell" | "hs" => "hs",
            "erlang" | "erl" => "erl",
            "clojure" | "clj" => "clj",
            "diff" | "patch" => "diff",
            other => other,
        };

        if let Some(syntax) = self.syntax_set.find_syntax_by_extension(extension) {
            return Some(syntax);
        }

        if let Some(syntax) = self.syntax_set.find_syntax_by_name(language) {
            return Some(syntax);
        }

        self.syntax_set
            .syntaxes()
            .iter()
            .find(|syntax| syntax.name.to_lowercase() == lang_lower)
    }
}

/// Global syntax highlighter instance.
static HIGHLIGHTER: OnceLock<SyntaxHighlighter> = OnceLock::new();

/// Get or create the global syntax highlighter.
pub fn get_highlighter() -> &'static SyntaxHighlighter {
    HIGHLIGHTER.get_or_init(SyntaxHighlighter::new)
}

/// HTML-escape a string.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
