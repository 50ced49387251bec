// src-tauri/src/upload/mod.rs
// Bug report transport: streams the multipart body and reports progress.

mod payload;

pub use payload::{FormPart, MultipartPayload};

use crate::report::ReportError;
use futures_util::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// POSTs assembled payloads to the bug-report endpoint. One instance is
/// shared across attempts; each call is an independent request.
pub struct Uploader {
    client: Client,
    url: String,
}

impl Uploader {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: url.into(),
        }
    }

    /// Sends the payload, invoking `on_progress(sent, total)` as body chunks
    /// are handed to the transport. Returns the trimmed response body, which
    /// the server uses for the report ID (possibly empty).
    pub async fn send(
        &self,
        payload: &MultipartPayload,
        on_progress: impl Fn(u64, u64) + Send + Sync + 'static,
    ) -> Result<String, ReportError> {
        let content_type = payload.content_type();
        let body_bytes = payload.encode();
        let total_bytes = body_bytes.len() as u64;

        tracing::info!(
            "Uploading report: {} parts, {} bytes",
            payload.parts().len(),
            total_bytes
        );

        on_progress(0, total_bytes);

        let sent_counter = Arc::new(AtomicU64::new(0));
        let counter = sent_counter.clone();
        let progress = Arc::new(on_progress);
        let progress_for_stream = progress.clone();

        // Chunked so the progress callback fires as the body drains instead
        // of once at the end.
        let chunks: Vec<Vec<u8>> = body_bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(|c| c.to_vec())
            .collect();

        let byte_stream = stream::iter(chunks.into_iter().map(move |chunk| {
            let sent = counter.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            progress_for_stream(sent, total_bytes);
            Ok::<Vec<u8>, Infallible>(chunk)
        }));

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total_bytes)
            .body(Body::wrap_stream(byte_stream))
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| ReportError::Network(e.to_string()))?;
                    Ok(body.trim().to_string())
                } else {
                    tracing::warn!("Report submission rejected: HTTP {}", status);
                    Err(ReportError::ServerStatus {
                        status: status.as_u16(),
                    })
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(ReportError::Timeout)
                } else {
                    Err(ReportError::Network(e.to_string()))
                }
            }
        }
    }
}
