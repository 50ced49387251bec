// src-tauri/src/report/mod.rs
// Crash report domain: manifest parsing, submission context, upload session.

pub mod progress;
pub mod session;

pub use progress::UploadProgress;
pub use session::{ReportStage, UploadSession};

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest keys that are consumed here rather than forwarded as metadata.
const MANIFEST_REPORT_KEY: &str = "report";
const MANIFEST_REPLAY_CRASH_KEY: &str = "replaycrash";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("File unavailable: {path}: {reason}")]
    FileUnavailable { path: String, reason: String },

    #[error("Network error uploading: {0}")]
    Network(String),

    #[error("Upload timed out")]
    Timeout,

    #[error("Server rejected report: HTTP {status}")]
    ServerStatus { status: u16 },

    #[error("Invalid crash manifest: {0}")]
    InvalidManifest(String),
}

impl ReportError {
    /// Retryable errors keep the dialog on the upload panel with a retry
    /// button; the rest fail before any network traffic happens.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReportError::Network(_) | ReportError::Timeout | ReportError::ServerStatus { .. }
        )
    }
}

/// Crash handler output: the path to the zipped report bundle plus free-form
/// metadata describing the crash. Written as a flat JSON object.
#[derive(Debug, Clone)]
pub struct CrashManifest {
    pub report_path: PathBuf,
    /// True when the crash happened while a capture was open, so attaching
    /// that capture is offered.
    pub replay_crash: bool,
    pub metadata: BTreeMap<String, String>,
}

impl CrashManifest {
    pub fn from_json_file(path: &Path) -> Result<Self, ReportError> {
        let raw = fs::read_to_string(path).map_err(|e| ReportError::FileUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ReportError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ReportError::InvalidManifest(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| ReportError::InvalidManifest("expected a JSON object".to_string()))?;

        let report_path = object
            .get(MANIFEST_REPORT_KEY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ReportError::InvalidManifest("missing report archive path".to_string())
            })?;

        let replay_crash = object
            .get(MANIFEST_REPLAY_CRASH_KEY)
            .map(|v| v.as_u64().unwrap_or(0) != 0)
            .unwrap_or(false);

        // Everything else travels as string metadata on the form.
        let mut metadata = BTreeMap::new();
        for (key, value) in object {
            if key == MANIFEST_REPORT_KEY || key == MANIFEST_REPLAY_CRASH_KEY {
                continue;
            }
            metadata.insert(key.clone(), json_value_to_string(value));
        }

        Ok(Self {
            report_path: PathBuf::from(report_path),
            replay_crash,
            metadata,
        })
    }
}

fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Everything the upload needs, frozen at the moment the user hits send.
/// Cloned as-is for retries; the payload is rebuilt (files re-read) each time.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub email: String,
    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub report_path: PathBuf,
    pub capture_path: Option<PathBuf>,
    pub thumbnail: Option<Vec<u8>>,
    pub include_capture: bool,
    pub submit_url: String,
}
