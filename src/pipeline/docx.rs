//! DOCX unwrapping: the plain text of `word/document.xml`.
//!
//! Formatting is dropped. Runs (`w:t`) are concatenated, `w:tab` becomes a
//! tab, `w:br`/`w:cr` a newline, and each paragraph (`w:p`) ends with a
//! newline.

use crate::error::DocShiftError;
use crate::format::FormatId;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

fn unreadable(detail: String) -> DocShiftError {
    DocShiftError::SourceUnreadable {
        format: FormatId::Docx,
        detail,
    }
}

/// Read the main document part out of a DOCX container and unwrap it.
pub fn docx_text(data: &[u8]) -> Result<String, DocShiftError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| unreadable(format!("invalid DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| unreadable(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| unreadable(format!("cannot read {DOCUMENT_PART}: {e}")))?;

    unwrap_document_xml(&xml)
}

/// Plain text of a WordprocessingML document body.
pub fn unwrap_document_xml(xml: &str) -> Result<String, DocShiftError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| unreadable(format!("bad text run: {err}")))?;
                    out.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(unreadable(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}
