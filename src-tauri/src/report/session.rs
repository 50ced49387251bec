use super::progress::UploadProgress;
use serde::Serialize;
use std::time::Instant;

/// Identifies one upload attempt. Callbacks carry the id they were started
/// with; anything from an older attempt is dropped.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStage {
    FillingDetails,
    Uploading,
    Reported,
}

/// State for one crash-report dialog: the three-panel flow plus the single
/// in-flight upload. The transport runs elsewhere and reports back through
/// `on_progress` / `on_complete` / `on_error`.
pub struct UploadSession {
    stage: ReportStage,
    request_id: RequestId,
    retry_enabled: bool,
    last_error: Option<String>,
    report_id: Option<String>,
    started_at: Option<Instant>,
    progress: UploadProgress,
    max_sent_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStateSnapshot {
    pub stage: ReportStage,
    pub retry_enabled: bool,
    pub last_error: Option<String>,
    pub report_id: Option<String>,
    pub progress: UploadProgress,
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            stage: ReportStage::FillingDetails,
            request_id: 0,
            retry_enabled: false,
            last_error: None,
            report_id: None,
            started_at: None,
            progress: UploadProgress::zero(),
            max_sent_bytes: 0,
        }
    }

    /// Starts a fresh upload attempt (first send or retry). Invalidates any
    /// previous request and anchors the elapsed-time clock for speed
    /// estimates.
    pub fn begin_upload(&mut self) -> RequestId {
        self.request_id += 1;
        self.stage = ReportStage::Uploading;
        self.retry_enabled = false;
        self.last_error = None;
        self.progress = UploadProgress::zero();
        self.max_sent_bytes = 0;
        self.started_at = Some(Instant::now());

        tracing::info!("Upload started (request {})", self.request_id);
        self.request_id
    }

    /// Applies a transport progress callback. Returns the sample to show, or
    /// None when the callback is stale or an error is already displayed.
    pub fn on_progress(
        &mut self,
        request: RequestId,
        sent_bytes: u64,
        total_bytes: u64,
    ) -> Option<UploadProgress> {
        if request != self.request_id || self.stage != ReportStage::Uploading || self.retry_enabled
        {
            return None;
        }

        let started_at = self.started_at?;

        // Transports may replay offsets after an internal retry; keep the
        // visible counter monotonic.
        let sent_bytes = sent_bytes.max(self.max_sent_bytes);
        self.max_sent_bytes = sent_bytes;

        let sample = UploadProgress::sample(sent_bytes, total_bytes, started_at.elapsed());
        self.progress = sample.clone();
        Some(sample)
    }

    /// Applies the transport completion. The trimmed body is the report ID;
    /// an empty body is still a success, just without one. Returns false when
    /// ignored: stale request, not uploading, or an error already won.
    pub fn on_complete(&mut self, request: RequestId, body: &str) -> bool {
        if request != self.request_id || self.stage != ReportStage::Uploading {
            return false;
        }
        if self.retry_enabled {
            // The user already saw the error and a retry button; a late
            // success from the same request must not flip the panel.
            tracing::warn!("Ignoring completion after error (request {})", request);
            return false;
        }

        let id = body.trim();
        self.report_id = if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        };
        self.stage = ReportStage::Reported;

        tracing::info!(
            "Report uploaded, id={}",
            self.report_id.as_deref().unwrap_or("<none>")
        );
        true
    }

    /// Marks the attempt failed and retryable. The stage stays Uploading so
    /// the dialog shows the error inline on the upload panel.
    pub fn on_error(&mut self, request: RequestId, message: &str) -> bool {
        if request != self.request_id || self.stage != ReportStage::Uploading || self.retry_enabled
        {
            return false;
        }

        tracing::warn!("Upload failed (request {}): {}", request, message);

        self.progress = UploadProgress::zero();
        self.max_sent_bytes = 0;
        self.last_error = Some(message.to_string());
        self.retry_enabled = true;
        true
    }

    /// Discards the in-flight request. The stage is untouched; the caller
    /// aborts the transport task and closes the dialog.
    pub fn cancel(&mut self) {
        self.request_id += 1;
        tracing::info!("Upload cancelled");
    }

    pub fn stage(&self) -> ReportStage {
        self.stage
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    pub fn report_id(&self) -> Option<&str> {
        self.report_id.as_deref()
    }

    pub fn snapshot(&self) -> UploadStateSnapshot {
        UploadStateSnapshot {
            stage: self.stage,
            retry_enabled: self.retry_enabled,
            last_error: self.last_error.clone(),
            report_id: self.report_id.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_with_report_id() {
        let mut session = UploadSession::new();
        assert_eq!(session.stage(), ReportStage::FillingDetails);

        let request = session.begin_upload();
        assert_eq!(session.stage(), ReportStage::Uploading);

        assert!(session.on_progress(request, 100, 1000).is_some());
        assert!(session.on_complete(request, "abc123"));
        assert_eq!(session.stage(), ReportStage::Reported);
        assert_eq!(session.report_id(), Some("abc123"));
    }

    #[test]
    fn empty_body_is_success_without_id() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();
        assert!(session.on_complete(request, "  \n"));
        assert_eq!(session.stage(), ReportStage::Reported);
        assert_eq!(session.report_id(), None);
    }

    #[test]
    fn error_keeps_uploading_stage_and_enables_retry() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();
        session.on_progress(request, 500, 1000);

        assert!(session.on_error(request, "connection reset"));
        assert_eq!(session.stage(), ReportStage::Uploading);
        assert!(session.retry_enabled());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.progress.sent_bytes, 0);
        assert_eq!(snapshot.last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn late_completion_after_error_is_ignored() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();

        assert!(session.on_error(request, "connection reset"));
        // same request finishes afterwards; the error already won
        assert!(!session.on_complete(request, "abc123"));
        assert_eq!(session.stage(), ReportStage::Uploading);
        assert_eq!(session.report_id(), None);
    }

    #[test]
    fn retry_then_complete_reports_new_id() {
        let mut session = UploadSession::new();
        let first = session.begin_upload();
        assert!(session.on_error(first, "connection reset"));

        let second = session.begin_upload();
        assert!(!session.retry_enabled());

        // stale callbacks from the discarded request are no-ops
        assert!(session.on_progress(first, 999, 1000).is_none());
        assert!(!session.on_complete(first, "stale-id"));
        assert!(!session.on_error(first, "stale error"));

        assert!(session.on_complete(second, "xyz"));
        assert_eq!(session.stage(), ReportStage::Reported);
        assert_eq!(session.report_id(), Some("xyz"));
    }

    #[test]
    fn cancel_suppresses_late_callbacks() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();
        session.cancel();

        assert!(session.on_progress(request, 10, 100).is_none());
        assert!(!session.on_complete(request, "abc"));
        assert!(!session.on_error(request, "boom"));
        // stage is the caller's problem after cancel
        assert_eq!(session.stage(), ReportStage::Uploading);
    }

    #[test]
    fn progress_is_monotonic_within_a_request() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();

        session.on_progress(request, 800, 1000);
        let sample = session.on_progress(request, 300, 1000).unwrap();
        assert_eq!(sample.sent_bytes, 800);
    }

    #[test]
    fn double_completion_is_ignored() {
        let mut session = UploadSession::new();
        let request = session.begin_upload();
        assert!(session.on_complete(request, "abc123"));
        assert!(!session.on_complete(request, "def456"));
        assert_eq!(session.report_id(), Some("abc123"));
    }
}
