// src-tauri/src/capture.rs
// Capture file access - thumbnail extraction for the report preview/upload.

use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture unreadable: {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Seam over the capture-file reader. Only the thumbnail is needed here; the
/// dialog shows it as a preview and attaches the same bytes as `thumb.jpg`.
pub trait CaptureReader: Send + Sync {
    /// Returns the capture's embedded JPEG thumbnail, or None when the
    /// capture has none.
    fn thumbnail(&self, path: &Path) -> Result<Option<Vec<u8>>, CaptureError>;
}

/// Default reader: captures embed their preview as a raw JPEG stream near the
/// container header, so locating the SOI/EOI markers is enough.
pub struct EmbeddedThumbnailReader;

impl CaptureReader for EmbeddedThumbnailReader {
    fn thumbnail(&self, path: &Path) -> Result<Option<Vec<u8>>, CaptureError> {
        let bytes = fs::read(path).map_err(|e| CaptureError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(extract_embedded_jpeg(&bytes))
    }
}

fn extract_embedded_jpeg(bytes: &[u8]) -> Option<Vec<u8>> {
    // SOI followed by a marker byte
    let start = bytes.windows(3).position(|w| w == [0xFF, 0xD8, 0xFF])?;
    // last EOI in the file, to not stop at stray 0xFFD9 payload bytes
    let end = bytes
        .windows(2)
        .rposition(|w| w == [0xFF, 0xD9])
        .filter(|&end| end > start)?;

    Some(bytes[start..end + 2].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fake_jpeg() -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.extend_from_slice(b"jpeg-ish payload");
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn extracts_jpeg_between_container_bytes() {
        let mut container = b"RDOC-HEADER".to_vec();
        let jpeg = fake_jpeg();
        container.extend_from_slice(&jpeg);
        container.extend_from_slice(b"trailing frame data");

        assert_eq!(extract_embedded_jpeg(&container), Some(jpeg));
    }

    #[test]
    fn no_jpeg_markers_means_no_thumbnail() {
        assert_eq!(extract_embedded_jpeg(b"no image in here"), None);
        // EOI before SOI is not a stream
        let bogus = [0xFF, 0xD9, 0x00, 0xFF, 0xD8];
        assert_eq!(extract_embedded_jpeg(&bogus), None);
    }

    #[test]
    fn reader_surfaces_missing_file() {
        let reader = EmbeddedThumbnailReader;
        let err = reader.thumbnail(Path::new("/nonexistent/cap.rdc")).unwrap_err();
        assert!(matches!(err, CaptureError::Unreadable { .. }));
    }

    #[test]
    fn reader_returns_thumbnail_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut contents = b"header".to_vec();
        contents.extend_from_slice(&fake_jpeg());
        file.write_all(&contents).unwrap();

        let reader = EmbeddedThumbnailReader;
        let thumb = reader.thumbnail(file.path()).unwrap();
        assert_eq!(thumb, Some(fake_jpeg()));
    }
}
