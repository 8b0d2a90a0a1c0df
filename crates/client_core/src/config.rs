use std::{collections::HashMap, fs, path::PathBuf};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub download_dir: PathBuf,
    pub success_close_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            download_dir: default_download_dir(),
            success_close_delay_ms: 1000,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Defaults, then an optional `toolbox.toml` next to the working directory,
/// then environment overrides.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("toolbox.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("download_dir") {
                settings.download_dir = PathBuf::from(v);
            }
        }
    }

    if let Ok(v) = std::env::var("TOOLBOX_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("TOOLBOX_DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }

    if let Ok(v) = std::env::var("APP__SUCCESS_CLOSE_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.success_close_delay_ms = parsed;
        }
    }

    settings.server_url = normalize_server_url(&settings.server_url);
    settings
}

/// Normalizes and checks the server url so every endpoint join is a plain
/// string concatenation.
pub fn prepare_server_url(raw: &str) -> anyhow::Result<String> {
    let server_url = normalize_server_url(raw);
    Url::parse(&server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
    Ok(server_url)
}

fn normalize_server_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');

    if raw.is_empty() {
        return Settings::default().server_url;
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }

    format!("http://{raw}")
}

/// Creates the download directory when missing so the artifact save never
/// fails on a fresh machine.
pub fn ensure_download_dir(settings: &Settings) -> anyhow::Result<()> {
    fs::create_dir_all(&settings.download_dir).with_context(|| {
        format!(
            "failed to create download directory '{}'",
            settings.download_dir.display()
        )
    })
}
