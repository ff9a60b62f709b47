//! ZIP bundling of multi-page raster output.

use std::io::{self, Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Entry name for a page: `page{N}.{ext}`.
pub fn entry_name(page_number: usize, extension: &str) -> String {
    format!("page{page_number}.{extension}")
}

/// Collects encoded pages into an in-memory ZIP archive.
pub struct BundleWriter {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    extension: &'static str,
    entries: usize,
}

impl BundleWriter {
    pub fn new(extension: &'static str) -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            extension,
            entries: 0,
        }
    }

    /// Append one page. Pages must be added in page order.
    pub fn add_page(&mut self, page_number: usize, data: &[u8]) -> io::Result<()> {
        // Compressed rasters gain nothing from deflate.
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        self.writer
            .start_file(entry_name(page_number, self.extension), options)?;
        self.writer.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Close the archive and return its bytes.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}
