//! PDF rendering with HTML fallback.
//!
//! Export is two explicit stages: render the HTML document, then try to
//! rasterize it through a [`PdfRenderer`]. If rasterization fails for any
//! reason the HTML document is returned instead.

use super::html::generate_html_document;
use super::options::{ExportFormat, ExportedDocument, DEFAULT_FILENAME};
use crate::config::ExportConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Browser binaries tried, in order, when none is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "microsoft-edge",
];

// ─────────────────────────────────────────────────────────────────────────────
// Renderer Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Turns a complete HTML document into PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless Browser Renderer
// ─────────────────────────────────────────────────────────────────────────────

/// Prints to PDF with a headless Chromium-family browser, one process per
/// document.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    browser: Option<PathBuf>,
    timeout: Duration,
}

impl ChromeRenderer {
    pub fn new(browser: Option<PathBuf>, timeout: Duration) -> Self {
        Self { browser, timeout }
    }

    /// Use the configured browser, or the first candidate found on `PATH`.
    pub fn from_config(config: &ExportConfig) -> Self {
        let browser = config.browser_path.clone().or_else(find_browser);
        match &browser {
            Some(path) => info!("PDF export will use {}", path.display()),
            None => info!("No headless browser found, PDF export will fall back to HTML"),
        }
        Self::new(browser, config.render_timeout())
    }
}

#[async_trait]
impl PdfRenderer for ChromeRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| Error::Export("no headless browser available".to_string()))?;

        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("document.html");
        let output = workdir.path().join("document.pdf");
        tokio::fs::write(&input, html).await?;

        let mut command = Command::new(browser);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Launching {} for PDF rendering", browser.display());
        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::Export(format!(
                    "browser did not finish within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Export(format!("failed to launch {}: {}", browser.display(), e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::Export(format!(
                "browser exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| Error::Export(format!("no PDF produced: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Export("browser produced an empty PDF".to_string()));
        }
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "headless-browser"
    }
}

/// Search `PATH` for a known browser binary.
fn find_browser() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| BROWSER_CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

// ─────────────────────────────────────────────────────────────────────────────
// Exporter
// ─────────────────────────────────────────────────────────────────────────────

/// Renders markdown documents for download.
#[derive(Clone)]
pub struct Exporter {
    renderer: Arc<dyn PdfRenderer>,
}

impl Exporter {
    pub fn new(renderer: Arc<dyn PdfRenderer>) -> Self {
        Self { renderer }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(Arc::new(ChromeRenderer::from_config(config)))
    }

    /// Export `markdown` in `format`. A missing filename defaults to
    /// `document.md`.
    pub async fn export(
        &self,
        markdown: &str,
        filename: Option<&str>,
        format: ExportFormat,
    ) -> Result<ExportedDocument> {
        let filename = filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME);

        // Stage one: HTML
        let html = generate_html_document(markdown, filename)?;
        if format == ExportFormat::Html {
            return Ok(ExportedDocument::new(html.into_bytes(), ExportFormat::Html, filename));
        }

        // Stage two: PDF, falling back to the HTML document
        match self.renderer.render(&html).await {
            Ok(pdf) => {
                info!("Rendered {} to PDF ({} bytes)", filename, pdf.len());
                Ok(ExportedDocument::new(pdf, ExportFormat::Pdf, filename))
            }
            Err(e) => {
                warn!(
                    "PDF rendering with {} failed, returning HTML instead: {}",
                    self.renderer.name(),
                    e
                );
                Ok(ExportedDocument::new(html.into_bytes(), ExportFormat::Html, filename))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    #[async_trait]
    impl PdfRenderer for Unavailable {
        async fn render(&self, _html: &str) -> Result<Vec<u8>> {
            Err(Error::Export("unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "unavailable"
        }
    }

    struct Fixed;

    #[async_trait]
    impl PdfRenderer for Fixed {
        async fn render(&self, html: &str) -> Result<Vec<u8>> {
            assert!(html.contains("<h1"));
            Ok(b"%PDF-1.7 test".to_vec())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_html_export_contains_heading() {
        let exporter = Exporter::new(Arc::new(Unavailable));
        let doc = exporter
            .export("# Title", Some("note.md"), ExportFormat::Html)
            .await
            .unwrap();

        assert_eq!(doc.format, ExportFormat::Html);
        assert_eq!(doc.filename, "note.html");
        let html = String::from_utf8(doc.bytes).unwrap();
        assert!(html.contains("<h1"));
    }

    #[tokio::test]
    async fn test_pdf_falls_back_to_html() {
        let exporter = Exporter::new(Arc::new(Unavailable));
        let doc = exporter
            .export("# Title", Some("note.md"), ExportFormat::Pdf)
            .await
            .unwrap();

        assert_eq!(doc.format, ExportFormat::Html);
        assert_eq!(doc.content_type(), "text/html; charset=utf-8");
        assert_eq!(doc.filename, "note.html");
    }

    #[tokio::test]
    async fn test_pdf_from_renderer() {
        let exporter = Exporter::new(Arc::new(Fixed));
        let doc = exporter
            .export("# Title", None, ExportFormat::Pdf)
            .await
            .unwrap();

        assert_eq!(doc.format, ExportFormat::Pdf);
        assert_eq!(doc.filename, "document.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_chrome_renderer_without_browser_fails() {
        let renderer = ChromeRenderer::new(None, Duration::from_secs(1));
        assert!(matches!(
            renderer.render("<html></html>").await,
            Err(Error::Export(_))
        ));
    }

    #[tokio::test]
    async fn test_chrome_renderer_with_missing_binary_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let renderer = ChromeRenderer::new(
            Some(temp.path().join("no-such-browser")),
            Duration::from_secs(5),
        );
        assert!(matches!(
            renderer.render("<html></html>").await,
            Err(Error::Export(_))
        ));
    }
}
