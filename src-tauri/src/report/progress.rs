use serde::Serialize;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1_000_000.0;
// Below this elapsed time the speed estimate is all noise.
const MIN_ELAPSED_FOR_ESTIMATE_SECS: f64 = 1.0;

/// Snapshot of the in-flight upload, emitted to the dialog on every
/// transport progress callback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
    /// 0.0 - 100.0; stays at 0 when the total is unknown.
    pub percent: f32,
    pub sent_mb: f64,
    pub total_mb: f64,
    /// MB/s, only once enough time has elapsed for a stable estimate.
    pub speed_mbps: Option<f64>,
    /// Formatted remaining time, same gating as `speed_mbps`.
    pub remaining: Option<String>,
}

impl UploadProgress {
    pub fn zero() -> Self {
        Self {
            sent_bytes: 0,
            total_bytes: 0,
            percent: 0.0,
            sent_mb: 0.0,
            total_mb: 0.0,
            speed_mbps: None,
            remaining: None,
        }
    }

    pub fn sample(sent_bytes: u64, total_bytes: u64, elapsed: Duration) -> Self {
        let sent_mb = sent_bytes as f64 / BYTES_PER_MB;
        let total_mb = total_bytes as f64 / BYTES_PER_MB;

        let percent = if total_bytes > 0 {
            ((sent_bytes as f64 / total_bytes as f64) * 100.0) as f32
        } else {
            0.0
        };

        let elapsed_secs = elapsed.as_secs_f64();

        let mut speed_mbps = None;
        let mut remaining = None;
        if elapsed_secs > MIN_ELAPSED_FOR_ESTIMATE_SECS && total_bytes > sent_bytes && sent_bytes > 0
        {
            let speed = sent_mb / elapsed_secs;
            let remaining_secs = ((total_mb - sent_mb) / speed) as u64;
            speed_mbps = Some(speed);
            remaining = Some(format_remaining(remaining_secs));
        }

        Self {
            sent_bytes,
            total_bytes,
            percent,
            sent_mb,
            total_mb,
            speed_mbps,
            remaining,
        }
    }
}

/// Formats a remaining-time estimate: `H:MM:SS` above an hour, `M:SS` above a
/// minute, otherwise "N seconds".
pub fn format_remaining(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}:{:02}", minutes, seconds)
    } else {
        format!("{} seconds", seconds)
    }
}
