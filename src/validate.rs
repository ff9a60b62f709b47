//! Output gate: decide whether a produced artifact is fit to hand back.
//!
//! Only the first 16 bytes are inspected. A payload passes when it is
//! non-empty, the prefix can be read, raster payloads reach a minimum
//! plausible size, and the prefix carries the format's signature where the
//! format has one.

use crate::artifact::OutputArtifact;
use crate::format::FormatId;
use std::io::Read;

/// Bytes read from the front of a payload.
pub const PREFIX_LEN: usize = 16;

/// Smallest raster payload considered plausible.
pub const MIN_RASTER_BYTES: usize = 32;

/// True when the artifact may be exposed to the caller.
pub fn validate(artifact: &OutputArtifact) -> bool {
    validate_bytes(artifact.format(), artifact.bytes())
}

/// Byte-level check shared by whole artifacts and per-page units.
pub fn validate_bytes(format: FormatId, data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }

    let mut prefix = [0u8; PREFIX_LEN];
    let want = data.len().min(PREFIX_LEN);
    let mut reader = data;
    if reader.read_exact(&mut prefix[..want]).is_err() {
        return false;
    }
    let prefix = &prefix[..want];

    if format.is_raster() && data.len() < MIN_RASTER_BYTES {
        return false;
    }

    has_signature(format, prefix)
}

fn has_signature(format: FormatId, prefix: &[u8]) -> bool {
    match format {
        FormatId::Pdf => prefix.starts_with(b"%PDF"),
        FormatId::Png => prefix.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        FormatId::Jpg => prefix.starts_with(&[0xFF, 0xD8]),
        FormatId::Webp => prefix.len() >= 12 && &prefix[..4] == b"RIFF" && &prefix[8..12] == b"WEBP",
        FormatId::Zip | FormatId::Docx => prefix.starts_with(b"PK\x03\x04"),
        FormatId::Txt | FormatId::Svg | FormatId::Heic => true,
    }
}
