//! Fixed-layout writer: text and pixels into single-page PDFs (printpdf).
//!
//! Text is set in builtin Helvetica on an A4-wide page. The page grows taller
//! than A4 when the text needs more lines, so nothing is ever clipped and
//! the document stays one page. Page height is capped at 14 400 pt, the
//! largest page PDF viewers accept; text that would overflow it is set in a
//! smaller font instead. Only below a 1 pt font does the text continue on a
//! second page of the same size. Images are placed at 72 DPI on a page the
//! size of the image, one pixel per point.

use crate::format::FormatId;
use crate::pipeline::encode::encode_surface;
use crate::pipeline::raster::Surface;
use printpdf::*;
use tracing::debug;

/// A4 width in mm.
const PAGE_W_MM: f32 = 210.0;
/// A4 height in mm; the minimum text page height.
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

const FONT_SIZE_PT: f32 = 11.0;
const MIN_FONT_SIZE_PT: f32 = 1.0;
const LINE_HEIGHT: f32 = 1.4;
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Tallest page viewers will open (14 400 pt, 200 in).
const MAX_PAGE_H_MM: f32 = 14_400.0 * MM_PER_PT;

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

fn chars_per_line(font_pt: f32) -> usize {
    let usable = PAGE_W_MM - 2.0 * MARGIN_MM;
    (usable / (font_pt * AVG_GLYPH_EM * MM_PER_PT)) as usize
}

/// Wrapped text plus the font and page size it was wrapped for.
#[derive(Debug)]
struct TextLayout {
    font_pt: f32,
    line_h_mm: f32,
    page_h_mm: f32,
    lines: Vec<String>,
    lines_per_page: usize,
}

/// Pick the largest font, up to 11 pt, whose page fits under the height cap.
fn layout_text(text: &str) -> TextLayout {
    let mut font_pt = FONT_SIZE_PT;
    loop {
        let lines = wrap_lines(text, chars_per_line(font_pt));
        let line_h_mm = font_pt * LINE_HEIGHT * MM_PER_PT;
        let body_mm = lines.len() as f32 * line_h_mm;
        let needed_mm = body_mm + 2.0 * MARGIN_MM;

        if needed_mm <= MAX_PAGE_H_MM {
            return TextLayout {
                font_pt,
                line_h_mm,
                page_h_mm: needed_mm.max(PAGE_H_MM),
                lines_per_page: lines.len().max(1),
                lines,
            };
        }
        if font_pt <= MIN_FONT_SIZE_PT {
            let fit = ((MAX_PAGE_H_MM - 2.0 * MARGIN_MM) / line_h_mm).floor() as usize;
            return TextLayout {
                font_pt,
                line_h_mm,
                page_h_mm: MAX_PAGE_H_MM,
                lines_per_page: fit.max(1),
                lines,
            };
        }

        // Line count and line height both scale with the font, so the page
        // height goes roughly with its square.
        let ratio = (MAX_PAGE_H_MM - 2.0 * MARGIN_MM) / body_mm;
        font_pt = (font_pt * ratio.sqrt() * 0.98).max(MIN_FONT_SIZE_PT);
    }
}

/// Greedy word wrap. Input line breaks are kept; blank input lines become
/// blank output lines. Words longer than `width` are hard-split.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw in text.lines() {
        let mut line = String::new();
        for word in raw.split_whitespace() {
            let mut word = word;
            while word.chars().count() > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                let cut = word
                    .char_indices()
                    .nth(width)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                out.push(word[..cut].to_string());
                word = &word[cut..];
            }
            if word.is_empty() {
                continue;
            }
            let needed = line.chars().count() + word.chars().count() + usize::from(!line.is_empty());
            if needed > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        out.push(line);
    }

    // Trailing blank lines carry nothing.
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

/// Lay `text` out on one page and serialise the document.
pub fn text_to_pdf(title: &str, text: &str) -> Vec<u8> {
    let layout = layout_text(text);
    let chunks: Vec<&[String]> = if layout.lines.is_empty() {
        vec![&layout.lines[..]]
    } else {
        layout.lines.chunks(layout.lines_per_page).collect()
    };

    let pages: Vec<PdfPage> = chunks
        .into_iter()
        .map(|lines| text_page(lines, &layout))
        .collect();

    debug!(
        "Laid out {} lines at {:.1} pt on {} page(s) of {:.0}x{:.0} mm",
        layout.lines.len(),
        layout.font_pt,
        pages.len(),
        PAGE_W_MM,
        layout.page_h_mm
    );

    let mut doc = PdfDocument::new(title);
    let mut warnings = Vec::new();
    doc.with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings)
}

fn text_page(lines: &[String], layout: &TextLayout) -> PdfPage {
    let mut ops = vec![
        Op::StartTextSection,
        Op::SetFontSizeBuiltinFont {
            size: Pt(layout.font_pt),
            font: BuiltinFont::Helvetica,
        },
    ];

    // First baseline sits one line below the top margin.
    let mut y = layout.page_h_mm - MARGIN_MM - layout.line_h_mm;
    for line in lines {
        if !line.is_empty() {
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Mm(MARGIN_MM).into(),
                    y: Mm(y).into(),
                },
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.clone())],
                font: BuiltinFont::Helvetica,
            });
        }
        y -= layout.line_h_mm;
    }
    ops.push(Op::EndTextSection);

    PdfPage::new(Mm(PAGE_W_MM), Mm(layout.page_h_mm), ops)
}

/// Embed the surface as a full-page image on a page of the same size.
pub fn image_to_pdf(title: &str, surface: &Surface) -> Result<Vec<u8>, String> {
    let png = encode_surface(surface, FormatId::Png)?;

    let mut warnings = Vec::new();
    let image = RawImage::decode_from_bytes(&png, &mut warnings)
        .map_err(|e| format!("image embed: {e}"))?;

    let mut doc = PdfDocument::new(title);
    let image_id = doc.add_image(&image);

    let w_mm = surface.width() as f32 * MM_PER_PT;
    let h_mm = surface.height() as f32 * MM_PER_PT;

    let ops = vec![Op::UseXobject {
        id: image_id,
        transform: XObjectTransform {
            translate_x: Some(Mm(0.0).into()),
            translate_y: Some(Mm(0.0).into()),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(72.0),
            ..Default::default()
        },
    }];

    let page = PdfPage::new(Mm(w_mm), Mm(h_mm), ops);
    let mut warnings = Vec::new();
    Ok(doc
        .with_pages(vec![page])
        .save(&PdfSaveOptions::default(), &mut warnings))
}
