//! Input and output payloads.
//!
//! A [`SourceArtifact`] is the caller's upload: bytes plus the display name
//! and the format detected from that name. The engine only ever reads it, so
//! the bytes live behind an `Arc<[u8]>` and move cheaply into blocking tasks.
//!
//! An [`OutputArtifact`] is what a conversion hands back. It is only ever
//! constructed inside the crate and only exposed after it has passed
//! [`crate::validate::validate`].

use crate::error::DocShiftError;
use crate::format::{detect_format, FormatId};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// An uploaded document or image.
#[derive(Clone)]
pub struct SourceArtifact {
    name: String,
    format: FormatId,
    data: Arc<[u8]>,
}

impl SourceArtifact {
    /// Wrap bytes whose format is already known.
    pub fn new(name: impl Into<String>, format: FormatId, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            format,
            data: data.into(),
        }
    }

    /// Accept an upload, detecting the format from the file name.
    ///
    /// The declared MIME type is passed through to [`detect_format`], which
    /// ignores it. An unknown extension is rejected with
    /// [`DocShiftError::UnsupportedUpload`].
    pub fn from_upload(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        declared_mime: Option<&str>,
    ) -> Result<Self, DocShiftError> {
        let name = name.into();
        let format = detect_format(&name, declared_mime)
            .ok_or_else(|| DocShiftError::UnsupportedUpload {
                file_name: name.clone(),
            })?;
        Ok(Self::new(name, format, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> FormatId {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Display name without directories or the final extension.
    ///
    /// Used to name outputs (`report.docx` → `report.pdf`). Falls back to
    /// `"output"` when nothing usable is left.
    pub fn base_name(&self) -> &str {
        let file = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name);
        let stem = match file.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => file,
        };
        if stem.trim().is_empty() {
            "output"
        } else {
            stem
        }
    }
}

impl fmt::Debug for SourceArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceArtifact")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A produced file: payload, format and the file name to deliver it under.
#[derive(Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    data: Vec<u8>,
    format: FormatId,
    file_name: String,
}

impl OutputArtifact {
    pub(crate) fn new(data: Vec<u8>, format: FormatId, base_name: &str) -> Self {
        Self {
            file_name: format!("{}.{}", base_name, format.extension()),
            data,
            format,
        }
    }

    pub fn format(&self) -> FormatId {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// `{baseName}.{ext}`, or `{baseName}.zip` for bundles.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for OutputArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputArtifact")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

// The payload itself is never serialised; `--json` reports describe it.
impl Serialize for OutputArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("OutputArtifact", 4)?;
        s.serialize_field("file_name", &self.file_name)?;
        s.serialize_field("format", &self.format)?;
        s.serialize_field("mime_type", self.mime_type())?;
        s.serialize_field("bytes", &self.data.len())?;
        s.end()
    }
}
