use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tauri::path::BaseDirectory;
use tauri::{AppHandle, Manager};

const CONFIG_DIR: &str = "rdc-crash-reporter";
const CONFIG_FILE: &str = "config.json";
const BUG_HISTORY_LIMIT: usize = 20;

pub const BUGREPORT_URL: &str = "https://renderdoc.org/bugsubmit";
pub const BUGREPORT_SITE_URL: &str = "https://renderdoc.org/bugs";

pub fn bug_url(id: &str) -> String {
    format!("{}/{}", BUGREPORT_SITE_URL, id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub remember_email: bool,
    pub email_address: String,
    /// Whether the one-time "please leave your email" prompt was shown.
    pub email_nagged: bool,
    /// Capture the tool had open when it crashed, offered as an attachment.
    pub last_opened_capture: Option<String>,
    pub reported_bugs: Vec<BugReport>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remember_email: true,
            email_address: String::new(),
            email_nagged: false,
            last_opened_capture: None,
            reported_bugs: Vec::new(),
        }
    }
}

/// A submitted report the user asked to follow for status updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReport {
    pub id: String,
    pub submit_date: String,
    pub check_date: String,
}

impl BugReport {
    pub fn submitted_now(id: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: id.to_string(),
            submit_date: now.clone(),
            check_date: now,
        }
    }

    pub fn url(&self) -> String {
        bug_url(&self.id)
    }
}

pub fn load_or_create(app: &AppHandle) -> Result<AppConfig, String> {
    let path = config_path(app)?;
    load_from(&path)
}

pub fn save(app: &AppHandle, config: &AppConfig) -> Result<(), String> {
    let path = config_path(app)?;
    save_raw(&path, config)
}

pub fn load_from(path: &Path) -> Result<AppConfig, String> {
    if !path.exists() {
        let config = AppConfig::default();
        save_raw(path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(config) => Ok(config),
        Err(_) => {
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(path, backup);
            let config = AppConfig::default();
            save_raw(path, &config)?;
            Ok(config)
        }
    }
}

/// Persists the email preference the moment the user sends the report, so a
/// later crash pre-fills the form.
pub fn remember_email(config: &mut AppConfig, remember: bool, email: &str) {
    config.remember_email = remember;
    if remember && !email.trim().is_empty() {
        config.email_address = email.trim().to_string();
    }
}

/// Appends a bug to the follow-up history, evicting the oldest entries past
/// the cap.
pub fn push_bug_report(config: &mut AppConfig, bug: BugReport) {
    config.reported_bugs.push(bug);
    while config.reported_bugs.len() > BUG_HISTORY_LIMIT {
        config.reported_bugs.remove(0);
    }
}

fn config_path(app: &AppHandle) -> Result<PathBuf, String> {
    let dir = app
        .path()
        .resolve(CONFIG_DIR, BaseDirectory::AppData)
        .map_err(|e| format!("Failed to resolve config dir: {}", e))?;
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
    Ok(dir.join(CONFIG_FILE))
}

fn save_raw(path: &Path, config: &AppConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to save config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_creates_default_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = load_from(&path).unwrap();
        assert!(config.remember_email);
        assert!(!config.email_nagged);
        assert!(config.reported_bugs.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.email_address = "dev@example.com".to_string();
        config.email_nagged = true;
        push_bug_report(&mut config, BugReport::submitted_now("abc123"));
        save_raw(&path, &config).unwrap();

        let reloaded = load_from(&path).unwrap();
        assert_eq!(reloaded.email_address, "dev@example.com");
        assert!(reloaded.email_nagged);
        assert_eq!(reloaded.reported_bugs.len(), 1);
        assert_eq!(reloaded.reported_bugs[0].id, "abc123");
    }

    #[test]
    fn corrupt_config_is_backed_up_and_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let config = load_from(&path).unwrap();
        assert!(config.reported_bugs.is_empty());
        assert!(dir.path().join("config.json.bak").exists());
    }

    #[test]
    fn bug_history_is_capped_oldest_first() {
        let mut config = AppConfig::default();
        for i in 0..25 {
            push_bug_report(&mut config, BugReport::submitted_now(&format!("bug-{}", i)));
        }

        assert_eq!(config.reported_bugs.len(), 20);
        assert_eq!(config.reported_bugs[0].id, "bug-5");
        assert_eq!(config.reported_bugs[19].id, "bug-24");
    }

    #[test]
    fn remember_email_only_stores_when_asked() {
        let mut config = AppConfig::default();

        remember_email(&mut config, true, " dev@example.com ");
        assert_eq!(config.email_address, "dev@example.com");

        remember_email(&mut config, false, "other@example.com");
        assert!(!config.remember_email);
        // previous address kept for when the user re-enables it
        assert_eq!(config.email_address, "dev@example.com");
    }

    #[test]
    fn bug_urls_point_at_the_tracker() {
        let bug = BugReport::submitted_now("abc123");
        assert_eq!(bug.url(), "https://renderdoc.org/bugs/abc123");
    }
}
