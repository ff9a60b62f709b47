//! Format registry: the closed set of known formats and the directed
//! compatibility matrix between them.
//!
//! The matrix is a single `match` over `(FormatId, FormatId)` in
//! [`strategy`]. Every other question ("is this pair supported?", "which
//! targets can a PDF reach?") is answered from that one function so the
//! compiler checks the dispatch for exhaustiveness.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical file format of an upload or an output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatId {
    Pdf,
    Docx,
    Txt,
    Png,
    Jpg,
    Webp,
    Svg,
    Heic,
    Zip,
}

impl FormatId {
    /// Every known format, in display order.
    pub const ALL: [FormatId; 9] = [
        FormatId::Pdf,
        FormatId::Docx,
        FormatId::Txt,
        FormatId::Png,
        FormatId::Jpg,
        FormatId::Webp,
        FormatId::Svg,
        FormatId::Heic,
        FormatId::Zip,
    ];

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FormatId::Pdf => "pdf",
            FormatId::Docx => "docx",
            FormatId::Txt => "txt",
            FormatId::Png => "png",
            FormatId::Jpg => "jpg",
            FormatId::Webp => "webp",
            FormatId::Svg => "svg",
            FormatId::Heic => "heic",
            FormatId::Zip => "zip",
        }
    }

    /// MIME label attached to artifacts of this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            FormatId::Pdf => "application/pdf",
            FormatId::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FormatId::Txt => "text/plain",
            FormatId::Png => "image/png",
            FormatId::Jpg => "image/jpeg",
            FormatId::Webp => "image/webp",
            FormatId::Svg => "image/svg+xml",
            FormatId::Heic => "image/heic",
            FormatId::Zip => "application/zip",
        }
    }

    /// Pixel-grid image formats.
    pub fn is_raster(self) -> bool {
        matches!(
            self,
            FormatId::Png | FormatId::Jpg | FormatId::Webp | FormatId::Heic
        )
    }

    /// Raster formats the image stack can both decode and encode.
    fn is_transcodable_raster(self) -> bool {
        matches!(self, FormatId::Png | FormatId::Jpg | FormatId::Webp)
    }

    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FormatId::Pdf),
            "docx" => Some(FormatId::Docx),
            "txt" | "text" => Some(FormatId::Txt),
            "png" => Some(FormatId::Png),
            "jpg" | "jpeg" => Some(FormatId::Jpg),
            "webp" => Some(FormatId::Webp),
            "svg" => Some(FormatId::Svg),
            "heic" | "heif" => Some(FormatId::Heic),
            "zip" => Some(FormatId::Zip),
            _ => None,
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for FormatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatId::from_extension(s.trim().trim_start_matches('.'))
            .ok_or_else(|| format!("unknown format '{s}'"))
    }
}

/// Transcoding strategy selected for a supported edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Unwrap text from a flow document and lay it out on a single page.
    DocumentToPdf,
    /// Embed a decoded raster image as a full-page image.
    RasterToPdf,
    /// Rasterise an SVG at intrinsic size, then embed it as a page.
    VectorToPdf,
    /// Render each PDF page at 2× and encode; bundle when N > 1.
    PdfToRaster,
    /// Decode and re-encode pixels, dimensions unchanged.
    RasterToRaster,
    /// Rasterise an SVG at intrinsic size and encode.
    VectorToRaster,
    /// Extract text and emit a UTF-8 text file.
    TextExport,
}

/// Look up the strategy for an edge. `None` means unsupported.
pub fn strategy(from: FormatId, to: FormatId) -> Option<Strategy> {
    use FormatId::*;

    if from == to {
        return None;
    }

    match (from, to) {
        (Docx, Pdf) | (Txt, Pdf) => Some(Strategy::DocumentToPdf),
        (Docx, Txt) | (Pdf, Txt) => Some(Strategy::TextExport),
        (Pdf, t) if t.is_transcodable_raster() => Some(Strategy::PdfToRaster),
        (s, Pdf) if s.is_transcodable_raster() => Some(Strategy::RasterToPdf),
        (s, t) if s.is_transcodable_raster() && t.is_transcodable_raster() => {
            Some(Strategy::RasterToRaster)
        }
        (Svg, Pdf) => Some(Strategy::VectorToPdf),
        (Svg, t) if t.is_transcodable_raster() => Some(Strategy::VectorToRaster),
        _ => None,
    }
}

/// Whether a conversion edge is supported. Pure and total.
pub fn is_supported(from: FormatId, to: FormatId) -> bool {
    strategy(from, to).is_some()
}

/// Targets reachable from `from`, in [`FormatId::ALL`] order.
pub fn supported_targets(from: FormatId) -> Vec<FormatId> {
    FormatId::ALL
        .iter()
        .copied()
        .filter(|&to| is_supported(from, to))
        .collect()
}

/// Detect a format from the file name's extension.
///
/// The declared MIME type is accepted for interface symmetry with upload
/// handlers but never consulted: browsers and HTTP clients report it
/// inconsistently, so the extension is the only source of truth.
pub fn detect_format(file_name: &str, _declared_mime: Option<&str>) -> Option<FormatId> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    FormatId::from_extension(ext)
}
