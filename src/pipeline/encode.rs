//! Raster codecs: decode uploads into pixels, encode a [`Surface`] into bytes.
//!
//! PNG and WebP keep the alpha channel (WebP is written lossless). JPEG has
//! no alpha, so the surface is composited over white first; otherwise
//! transparent regions would come out black.

use crate::error::DocShiftError;
use crate::format::FormatId;
use crate::pipeline::raster::Surface;
use image::{DynamicImage, ExtendedColorType, ImageFormat};
use std::io::Cursor;
use tracing::debug;

fn image_format(format: FormatId) -> Option<ImageFormat> {
    match format {
        FormatId::Png => Some(ImageFormat::Png),
        FormatId::Jpg => Some(ImageFormat::Jpeg),
        FormatId::Webp => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decode a raster payload of the given format.
pub fn decode_raster(format: FormatId, data: &[u8]) -> Result<DynamicImage, DocShiftError> {
    let fmt = image_format(format).ok_or_else(|| DocShiftError::SourceUnreadable {
        format,
        detail: "no decoder for this format".into(),
    })?;
    let img = image::load_from_memory_with_format(data, fmt).map_err(|e| {
        DocShiftError::SourceUnreadable {
            format,
            detail: e.to_string(),
        }
    })?;
    debug!("Decoded {} → {}x{} px", format, img.width(), img.height());
    Ok(img)
}

/// Encode the surface as `format`. Dimensions are preserved.
pub fn encode_surface(surface: &Surface, format: FormatId) -> Result<Vec<u8>, String> {
    let fmt = image_format(format).ok_or_else(|| format!("cannot encode {format}"))?;
    let (w, h) = (surface.width(), surface.height());

    let mut buf = Vec::new();
    let result = if format == FormatId::Jpg {
        let rgb = flatten_over_white(surface.pixels());
        image::write_buffer_with_format(
            &mut Cursor::new(&mut buf),
            &rgb,
            w,
            h,
            ExtendedColorType::Rgb8,
            fmt,
        )
    } else {
        image::write_buffer_with_format(
            &mut Cursor::new(&mut buf),
            surface.pixels(),
            w,
            h,
            ExtendedColorType::Rgba8,
            fmt,
        )
    };
    result.map_err(|e| e.to_string())?;

    debug!("Encoded {}x{} px → {} bytes {}", w, h, buf.len(), format);
    Ok(buf)
}

/// Composite straight-alpha RGBA over an opaque white background.
fn flatten_over_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        for &c in &px[..3] {
            let v = (c as u32 * a + 255 * (255 - a) + 127) / 255;
            rgb.push(v as u8);
        }
    }
    rgb
}
