//! RasterBridge: every pixel path goes through one RGBA [`Surface`].
//!
//! PDF pages, SVG documents and decoded raster images are all loaded into
//! the same surface before any encoder sees them. The surface is owned by a
//! [`RasterBridge`] and reused page after page; it is cleared before each
//! load so a failed page never leaks the previous page's pixels.

use crate::error::{DocShiftError, UnitError};
use crate::format::FormatId;
use crate::pipeline::pdfium::{PdfBackend, RenderOptions};
use image::DynamicImage;
use once_cell::sync::Lazy;
use resvg::{tiny_skia, usvg};
use std::sync::Arc;
use tracing::debug;

/// Fixed upscale factor for PDF page rendering.
pub const PDF_RENDER_SCALE: f32 = 2.0;

/// A reusable straight-alpha RGBA8 pixel buffer.
#[derive(Debug, Default, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.pixels.clear();
    }

    /// Replace the contents with a decoded image.
    pub fn load(&mut self, image: &DynamicImage) {
        self.clear();
        self.width = image.width();
        self.height = image.height();
        match image.as_rgba8() {
            Some(buf) => self.pixels.extend_from_slice(buf.as_raw()),
            None => self.pixels.extend_from_slice(image.to_rgba8().as_raw()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGBA8, `width * height * 4` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Zero area, or no visible content: every pixel is fully transparent
    /// or every visible pixel has the same colour (a blank page rendered
    /// over an opaque background).
    pub fn is_degenerate(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return true;
        }
        let mut ink = self.pixels.chunks_exact(4).filter(|px| px[3] != 0);
        match ink.next() {
            None => true,
            Some(first) => ink.all(|px| px == first),
        }
    }
}

// System fonts are loaded once; SVG text needs them.
static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} font faces for SVG text", db.len());
    Arc::new(db)
});

/// Owns the surface and walks sources into it.
#[derive(Debug, Default)]
pub struct RasterBridge {
    surface: Surface,
}

impl RasterBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an already-decoded raster image.
    pub fn load_image(&mut self, image: &DynamicImage) -> &Surface {
        self.surface.load(image);
        &self.surface
    }

    /// Rasterise an SVG document at its intrinsic size.
    pub fn rasterize_svg(&mut self, svg: &[u8]) -> Result<&Surface, DocShiftError> {
        let unreadable = |detail: String| DocShiftError::SourceUnreadable {
            format: FormatId::Svg,
            detail,
        };

        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&FONT_DB);
        let tree = usvg::Tree::from_data(svg, &opt).map_err(|e| unreadable(e.to_string()))?;

        let size = tree.size().to_int_size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            unreadable(format!(
                "cannot allocate a {}x{} canvas",
                size.width(),
                size.height()
            ))
        })?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        self.surface.clear();
        self.surface.width = pixmap.width();
        self.surface.height = pixmap.height();
        for px in pixmap.pixels() {
            let c = px.demultiply();
            self.surface
                .pixels
                .extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        debug!("Rasterised SVG → {}x{} px", self.surface.width, self.surface.height);

        Ok(&self.surface)
    }

    /// Render every page of a PDF at [`PDF_RENDER_SCALE`] and hand each
    /// loaded surface to `on_page(page_number, result)` (1-based).
    ///
    /// Pages that fail to render or come out degenerate are reported as
    /// [`UnitError`]s; the walk continues. Returns the page count.
    pub fn render_pdf(
        &mut self,
        backend: &dyn PdfBackend,
        pdf: &[u8],
        password: Option<&str>,
        max_pixels: u32,
        mut on_page: impl FnMut(usize, Result<&Surface, UnitError>),
    ) -> Result<usize, DocShiftError> {
        let options = RenderOptions {
            scale: PDF_RENDER_SCALE,
            max_pixels,
        };
        let surface = &mut self.surface;

        backend.render_pages(pdf, password, options, &mut |idx, rendered| {
            let page = idx + 1;
            surface.clear();
            match rendered {
                Err(detail) => on_page(page, Err(UnitError::RenderFailed { page, detail })),
                Ok(image) => {
                    surface.load(&image);
                    if surface.is_degenerate() {
                        on_page(
                            page,
                            Err(UnitError::Degenerate {
                                page,
                                width: surface.width(),
                                height: surface.height(),
                            }),
                        );
                    } else {
                        on_page(page, Ok(&*surface));
                    }
                }
            }
        })
    }
}
