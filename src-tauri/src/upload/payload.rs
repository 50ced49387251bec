use crate::report::{ReportContext, ReportError};
use std::fs;
use std::path::Path;

const CAPTURE_CONTENT_TYPE: &str = "application/x-renderdoc-capture";
const CAPTURE_FILENAME: &str = "capture.rdc";
const THUMB_CONTENT_TYPE: &str = "image/jpeg";
const THUMB_FILENAME: &str = "thumb.jpg";
const REPORT_CONTENT_TYPE: &str = "application/zip";
const REPORT_FILENAME: &str = "report.zip";

/// One field of the multipart form: plain text for metadata, file-flavoured
/// for the binary attachments.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FormPart {
    fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            filename: None,
            content_type: None,
            body: value.as_bytes().to_vec(),
        }
    }

    fn file(name: &str, filename: &str, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            body,
        }
    }
}

/// The fully assembled multipart/form-data body for one submission attempt.
///
/// Files are read here, before any network traffic, so missing or unreadable
/// files fail the attempt up front. Each retry rebuilds the payload from the
/// context and re-reads them.
#[derive(Debug)]
pub struct MultipartPayload {
    boundary: String,
    parts: Vec<FormPart>,
}

impl MultipartPayload {
    pub fn from_context(context: &ReportContext) -> Result<Self, ReportError> {
        let mut parts = Vec::new();

        for (key, value) in &context.metadata {
            parts.push(FormPart::text(key, value));
        }

        if !context.email.trim().is_empty() {
            parts.push(FormPart::text("email", context.email.trim()));
        }

        if !context.description.trim().is_empty() {
            parts.push(FormPart::text("description", &context.description));
        }

        if context.include_capture {
            if let Some(capture_path) = &context.capture_path {
                let capture_bytes = read_attachment(capture_path)?;
                parts.push(FormPart::file(
                    "capture",
                    CAPTURE_FILENAME,
                    CAPTURE_CONTENT_TYPE,
                    capture_bytes,
                ));

                if let Some(thumbnail) = &context.thumbnail {
                    parts.push(FormPart::file(
                        "thumb",
                        THUMB_FILENAME,
                        THUMB_CONTENT_TYPE,
                        thumbnail.clone(),
                    ));
                }
            }
        }

        let report_bytes = read_attachment(&context.report_path)?;
        parts.push(FormPart::file(
            "report",
            REPORT_FILENAME,
            REPORT_CONTENT_TYPE,
            report_bytes,
        ));

        Ok(Self {
            boundary: format!("----CrashReportBoundary{}", uuid::Uuid::new_v4().simple()),
            parts,
        })
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Standard multipart/form-data encoding, CRLF line endings throughout.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();

        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());

            match &part.filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name)
                        .as_bytes(),
                ),
            }

            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }

            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.body);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body
    }
}

fn read_attachment(path: &Path) -> Result<Vec<u8>, ReportError> {
    fs::read(path).map_err(|e| ReportError::FileUnavailable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
