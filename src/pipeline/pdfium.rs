//! PDF engine seam: page counting, page rendering and page text.
//!
//! [`PdfBackend`] is the only place the crate talks to a PDF engine. The
//! production implementation, [`PdfiumBackend`], resolves the pdfium shared
//! library once at construction (downloading and caching it through
//! `pdfium-auto` on first use) and binds it per operation, because the
//! upstream `Pdfium` handle borrows into every document it opens.
//!
//! All methods are blocking. Callers run them inside
//! `tokio::task::spawn_blocking`.

use crate::error::DocShiftError;
use crate::format::FormatId;
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How a page is rasterised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Upscale factor applied to the page's size in points.
    pub scale: f32,
    /// Cap on either rendered edge, in pixels.
    pub max_pixels: u32,
}

/// Outcome of rendering one page: the pixels, or why they are missing.
pub type PageRender = Result<DynamicImage, String>;

/// Blocking access to a PDF engine.
///
/// Document-level failures (unreadable payload, wrong password, engine not
/// bound) are returned as `Err`. Per-page failures are handed to the visitor
/// so the caller can skip the page and carry on.
pub trait PdfBackend: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, pdf: &[u8], password: Option<&str>) -> Result<usize, DocShiftError>;

    /// Render every page in order, calling `visit(index, render)` for each
    /// (0-based index). Returns the page count.
    fn render_pages(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        options: RenderOptions,
        visit: &mut dyn FnMut(usize, PageRender),
    ) -> Result<usize, DocShiftError>;

    /// Read each page's text in order, calling `visit(index, text)`.
    /// Iteration stops early when `visit` returns `false`.
    fn page_texts(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(usize, String) -> bool,
    ) -> Result<usize, DocShiftError>;
}

/// Compute pixel dimensions for a page, preserving aspect ratio when the
/// scaled size exceeds `max_pixels` on either edge. Both results are ≥ 1.
pub fn compute_render_dimensions(
    width_points: f32,
    height_points: f32,
    options: RenderOptions,
) -> (u32, u32) {
    let raw_w = (width_points * options.scale).max(1.0);
    let raw_h = (height_points * options.scale).max(1.0);
    let max = options.max_pixels.max(1) as f32;

    let longest = raw_w.max(raw_h);
    if longest > max {
        let ratio = max / longest;
        let w = ((raw_w * ratio) as u32).clamp(1, options.max_pixels.max(1));
        let h = ((raw_h * ratio) as u32).clamp(1, options.max_pixels.max(1));
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`PdfBackend`] backed by Google's pdfium.
///
/// Construct once and share through an `Arc`.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    lib_path: PathBuf,
}

impl PdfiumBackend {
    /// Locate (or download) pdfium and check that it binds.
    ///
    /// Honours `PDFIUM_LIB_PATH`; otherwise the library is cached under the
    /// user's cache directory after the first download.
    pub fn new() -> Result<Self, DocShiftError> {
        let lib_path = pdfium_auto::ensure_pdfium_library(None)
            .map_err(|e| DocShiftError::PdfiumBindingFailed(e.to_string()))?;
        Self::with_library(lib_path)
    }

    /// Use a pdfium library at an explicit path.
    pub fn with_library(lib_path: impl Into<PathBuf>) -> Result<Self, DocShiftError> {
        let backend = Self {
            lib_path: lib_path.into(),
        };
        let _ = backend.bind()?;
        info!("pdfium bound from {}", backend.lib_path.display());
        Ok(backend)
    }

    fn bind(&self) -> Result<Pdfium, DocShiftError> {
        pdfium_auto::bind_pdfium_from_path(&self.lib_path)
            .map_err(|e| DocShiftError::PdfiumBindingFailed(e.to_string()))
    }
}

/// Map a document load error, calling out password problems.
fn map_load_error(e: PdfiumError, password: Option<&str>) -> DocShiftError {
    let msg = format!("{e:?}");
    let lower = msg.to_lowercase();
    let detail = if lower.contains("password") || lower.contains("encrypt") {
        if password.is_some() {
            "incorrect password for encrypted PDF".to_string()
        } else {
            "PDF is encrypted; supply a password".to_string()
        }
    } else {
        format!("failed to load PDF: {msg}")
    };
    DocShiftError::SourceUnreadable {
        format: FormatId::Pdf,
        detail,
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_count(&self, pdf: &[u8], password: Option<&str>) -> Result<usize, DocShiftError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| map_load_error(e, password))?;
        Ok(document.pages().len() as usize)
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        options: RenderOptions,
        visit: &mut dyn FnMut(usize, PageRender),
    ) -> Result<usize, DocShiftError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| map_load_error(e, password))?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} pages", total);

        for (idx, page) in pages.iter().enumerate() {
            let (w, h) = compute_render_dimensions(page.width().value, page.height().value, options);
            let config = PdfRenderConfig::new()
                .set_target_width(w as i32)
                .set_maximum_height(h as i32);

            let rendered = page
                .render_with_config(&config)
                .map(|bitmap| bitmap.as_image())
                .map_err(|e| format!("{e:?}"));

            match &rendered {
                Ok(img) => debug!("Rendered page {} → {}x{} px", idx + 1, img.width(), img.height()),
                Err(e) => warn!("Page {}: render failed: {}", idx + 1, e),
            }
            visit(idx, rendered);
        }

        Ok(total)
    }

    fn page_texts(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(usize, String) -> bool,
    ) -> Result<usize, DocShiftError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| map_load_error(e, password))?;

        let pages = document.pages();
        let total = pages.len() as usize;

        for (idx, page) in pages.iter().enumerate() {
            let text = match page.text() {
                Ok(t) => t.all(),
                Err(e) => {
                    warn!("Page {}: text layer unreadable, treating as blank: {:?}", idx + 1, e);
                    String::new()
                }
            };
            if !visit(idx, text) {
                debug!("Text extraction stopped after page {}", idx + 1);
                break;
            }
        }

        Ok(total)
    }
}

/// [`PdfBackend`] that locates and binds pdfium on the first PDF operation.
///
/// Conversions that never touch a PDF never download the library.
#[derive(Debug, Default)]
pub struct LazyPdfium {
    inner: OnceCell<PdfiumBackend>,
}

impl LazyPdfium {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self) -> Result<&PdfiumBackend, DocShiftError> {
        self.inner.get_or_try_init(PdfiumBackend::new)
    }
}

impl PdfBackend for LazyPdfium {
    fn page_count(&self, pdf: &[u8], password: Option<&str>) -> Result<usize, DocShiftError> {
        self.get()?.page_count(pdf, password)
    }

    fn render_pages(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        options: RenderOptions,
        visit: &mut dyn FnMut(usize, PageRender),
    ) -> Result<usize, DocShiftError> {
        self.get()?.render_pages(pdf, password, options, visit)
    }

    fn page_texts(
        &self,
        pdf: &[u8],
        password: Option<&str>,
        visit: &mut dyn FnMut(usize, String) -> bool,
    ) -> Result<usize, DocShiftError> {
        self.get()?.page_texts(pdf, password, visit)
    }
}
