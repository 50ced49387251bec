mod capture;
mod config;
mod report;
mod upload;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use capture::{CaptureReader, EmbeddedThumbnailReader};
use config::{AppConfig, BugReport};
use report::session::UploadStateSnapshot;
use report::{CrashManifest, ReportContext, UploadSession};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tauri::{Emitter, State};
use upload::{MultipartPayload, Uploader};

struct AppState {
    /// Crash handler output this dialog was launched for, if any.
    manifest: Option<CrashManifest>,
    /// Context of the last submission, kept for retries.
    context: Arc<Mutex<Option<ReportContext>>>,
    session: Arc<Mutex<UploadSession>>,
    upload_task: Arc<Mutex<Option<tauri::async_runtime::JoinHandle<()>>>>,
    capture_reader: Arc<dyn CaptureReader>,
}

/// Everything the details panel needs when the dialog opens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportFormData {
    report_path: String,
    metadata: BTreeMap<String, String>,
    /// Present only when the crash has an associated capture on disk.
    capture_filename: Option<String>,
    /// Base64 JPEG preview of that capture.
    capture_thumbnail: Option<String>,
    email: String,
    remember_email: bool,
    bug_report_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendReportPayload {
    email: String,
    description: String,
    include_capture: bool,
    remember_email: bool,
    /// Set by the frontend after the "really upload your capture?" prompt.
    capture_confirmed: bool,
}

/// What `send_report` wants the frontend to do next.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
enum SendOutcome {
    /// Confirm the private capture upload, then resend with
    /// `captureConfirmed`.
    CaptureConfirmationRequired,
    /// One-time prompt to fill in an email; resend proceeds either way.
    EmailNag,
    Started,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadCompletePayload {
    report_id: Option<String>,
    report_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadErrorPayload {
    message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadStateResponse {
    #[serde(flatten)]
    snapshot: UploadStateSnapshot,
    report_url: Option<String>,
}

fn resolve_capture_path(config: &AppConfig, manifest: &CrashManifest) -> Option<PathBuf> {
    if !manifest.replay_crash {
        return None;
    }
    config
        .last_opened_capture
        .as_deref()
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}

#[tauri::command]
fn get_report_form(
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<ReportFormData, String> {
    let manifest = state
        .manifest
        .as_ref()
        .ok_or("No crash report manifest loaded")?;
    let config = config::load_or_create(&app_handle)?;

    let capture_path = resolve_capture_path(&config, manifest);
    let capture_thumbnail = capture_path.as_ref().and_then(|path| {
        match state.capture_reader.thumbnail(path) {
            Ok(thumb) => thumb.map(|bytes| BASE64_STANDARD.encode(bytes)),
            Err(e) => {
                tracing::warn!("Capture preview unavailable: {}", e);
                None
            }
        }
    });
    let capture_filename = capture_path.as_ref().and_then(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
    });

    Ok(ReportFormData {
        report_path: manifest.report_path.display().to_string(),
        metadata: manifest.metadata.clone(),
        capture_filename,
        capture_thumbnail,
        email: if config.remember_email {
            config.email_address.clone()
        } else {
            String::new()
        },
        remember_email: config.remember_email,
        bug_report_url: config::BUGREPORT_URL.to_string(),
    })
}

#[tauri::command]
fn send_report(
    payload: SendReportPayload,
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<SendOutcome, String> {
    let manifest = state
        .manifest
        .as_ref()
        .ok_or("No crash report manifest loaded")?;

    // uploading a capture is private data; make the user confirm once
    if payload.include_capture && !payload.capture_confirmed {
        return Ok(SendOutcome::CaptureConfirmationRequired);
    }

    let mut config = config::load_or_create(&app_handle)?;

    // reports without a contact address mostly can't be resolved; nag once
    if !config.email_nagged && payload.email.trim().is_empty() {
        config.email_nagged = true;
        config::save(&app_handle, &config)?;
        return Ok(SendOutcome::EmailNag);
    }

    config::remember_email(&mut config, payload.remember_email, &payload.email);
    config::save(&app_handle, &config)?;

    let capture_path = if payload.include_capture {
        resolve_capture_path(&config, manifest)
    } else {
        None
    };
    let thumbnail = capture_path.as_ref().and_then(|path| {
        match state.capture_reader.thumbnail(path) {
            Ok(thumb) => thumb,
            Err(e) => {
                tracing::warn!("Capture thumbnail unavailable: {}", e);
                None
            }
        }
    });

    let context = ReportContext {
        email: payload.email.trim().to_string(),
        description: payload.description,
        metadata: manifest.metadata.clone(),
        report_path: manifest.report_path.clone(),
        include_capture: capture_path.is_some(),
        capture_path,
        thumbnail,
        submit_url: config::BUGREPORT_URL.to_string(),
    };

    {
        let mut stored = state.context.lock().map_err(|e| e.to_string())?;
        *stored = Some(context.clone());
    }

    start_upload(state.inner(), &app_handle, context)?;
    Ok(SendOutcome::Started)
}

#[tauri::command]
fn retry_upload(state: State<'_, AppState>, app_handle: tauri::AppHandle) -> Result<(), String> {
    let context = state
        .context
        .lock()
        .map_err(|e| e.to_string())?
        .clone()
        .ok_or("No report submission to retry")?;

    // same context, fresh payload: attachment files are re-read
    start_upload(state.inner(), &app_handle, context)
}

#[tauri::command]
fn cancel_upload(state: State<'_, AppState>) -> Result<(), String> {
    if let Ok(mut task) = state.upload_task.lock() {
        if let Some(existing) = task.take() {
            existing.abort();
        }
    }
    state.session.lock().map_err(|e| e.to_string())?.cancel();
    Ok(())
}

#[tauri::command]
fn get_upload_state(state: State<'_, AppState>) -> Result<UploadStateResponse, String> {
    let session = state.session.lock().map_err(|e| e.to_string())?;
    let report_url = session.report_id().map(config::bug_url);
    Ok(UploadStateResponse {
        snapshot: session.snapshot(),
        report_url,
    })
}

#[tauri::command]
fn accept_report(
    check_updates: bool,
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
) -> Result<(), String> {
    let report_id = state
        .session
        .lock()
        .map_err(|e| e.to_string())?
        .report_id()
        .map(str::to_string);

    if check_updates {
        if let Some(id) = report_id {
            let mut config = config::load_or_create(&app_handle)?;
            config::push_bug_report(&mut config, BugReport::submitted_now(&id));
            config::save(&app_handle, &config)?;
            tracing::info!("Bug {} queued for update checks", id);
        }
    }
    Ok(())
}

fn start_upload(
    state: &AppState,
    app_handle: &tauri::AppHandle,
    context: ReportContext,
) -> Result<(), String> {
    // file problems surface here, before the dialog flips to the upload panel
    let payload = MultipartPayload::from_context(&context).map_err(|e| e.to_string())?;

    if let Ok(mut task) = state.upload_task.lock() {
        if let Some(existing) = task.take() {
            existing.abort();
        }
    }

    let request = state
        .session
        .lock()
        .map_err(|e| e.to_string())?
        .begin_upload();

    let session = state.session.clone();
    let app = app_handle.clone();
    let submit_url = context.submit_url.clone();

    let handle = tauri::async_runtime::spawn(async move {
        let uploader = Uploader::new(submit_url);

        let progress_session = session.clone();
        let progress_app = app.clone();
        let result = uploader
            .send(&payload, move |sent, total| {
                if let Ok(mut session) = progress_session.lock() {
                    if let Some(sample) = session.on_progress(request, sent, total) {
                        let _ = progress_app.emit("upload-progress", sample);
                    }
                }
            })
            .await;

        match result {
            Ok(body) => {
                let applied = session
                    .lock()
                    .map(|mut session| session.on_complete(request, &body))
                    .unwrap_or(false);
                if applied {
                    let id = body.trim().to_string();
                    let _ = app.emit(
                        "upload-complete",
                        UploadCompletePayload {
                            report_url: (!id.is_empty()).then(|| config::bug_url(&id)),
                            report_id: (!id.is_empty()).then_some(id),
                        },
                    );
                }
            }
            Err(e) => {
                let message = e.to_string();
                let applied = session
                    .lock()
                    .map(|mut session| session.on_error(request, &message))
                    .unwrap_or(false);
                if applied {
                    let _ = app.emit("upload-error", UploadErrorPayload { message });
                }
            }
        }
    });

    if let Ok(mut task) = state.upload_task.lock() {
        *task = Some(handle);
    }
    Ok(())
}

fn load_manifest_from_invocation() -> Option<CrashManifest> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CRASH_REPORT_MANIFEST").ok())?;

    match CrashManifest::from_json_file(Path::new(&path)) {
        Ok(manifest) => {
            tracing::info!(
                "Loaded crash manifest from {} ({} metadata keys)",
                path,
                manifest.metadata.len()
            );
            Some(manifest)
        }
        Err(e) => {
            tracing::error!("Failed to load crash manifest from {}: {}", path, e);
            None
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let manifest = load_manifest_from_invocation();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(AppState {
            manifest,
            context: Arc::new(Mutex::new(None)),
            session: Arc::new(Mutex::new(UploadSession::new())),
            upload_task: Arc::new(Mutex::new(None)),
            capture_reader: Arc::new(EmbeddedThumbnailReader),
        })
        .invoke_handler(tauri::generate_handler![
            get_report_form,
            send_report,
            retry_upload,
            cancel_upload,
            get_upload_state,
            accept_report
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_only_offered_for_replay_crashes_with_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = AppConfig::default();
        config.last_opened_capture = Some(file.path().display().to_string());

        let mut manifest = CrashManifest::from_json_str(r#"{"report": "r.zip"}"#).unwrap();
        assert_eq!(resolve_capture_path(&config, &manifest), None);

        manifest.replay_crash = true;
        assert_eq!(
            resolve_capture_path(&config, &manifest),
            Some(file.path().to_path_buf())
        );

        config.last_opened_capture = Some("/nonexistent/cap.rdc".to_string());
        assert_eq!(resolve_capture_path(&config, &manifest), None);

        config.last_opened_capture = None;
        assert_eq!(resolve_capture_path(&config, &manifest), None);
    }
}
