use std::{
    fs,
    io::ErrorKind,
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result};
use client_core::ControllerTimings;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    /// `None` waits on the prediction service indefinitely. Zero from any
    /// source also means no timeout.
    pub request_timeout_secs: Option<u64>,
    pub error_dismiss_ms: u64,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            request_timeout_secs: None,
            error_dismiss_ms: 5_000,
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    error_dismiss_ms: Option<u64>,
    log_level: Option<String>,
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn timings(&self) -> ControllerTimings {
        ControllerTimings {
            error_dismiss: Duration::from_millis(self.error_dismiss_ms),
            ..ControllerTimings::default()
        }
    }

    fn apply_file(&mut self, raw: &str) -> Result<()> {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = (v > 0).then_some(v);
        }
        if let Some(v) = file_cfg.error_dismiss_ms {
            self.error_dismiss_ms = v;
        }
        if let Some(v) = file_cfg.log_level {
            self.log_level = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("PREDICT_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = var("APP__SERVER_URL") {
            self.server_url = v;
        }

        if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
            let secs = v
                .parse::<u64>()
                .with_context(|| format!("invalid APP__REQUEST_TIMEOUT_SECS '{v}'"))?;
            self.request_timeout_secs = (secs > 0).then_some(secs);
        }

        if let Some(v) = var("APP__ERROR_DISMISS_MS") {
            self.error_dismiss_ms = v
                .parse()
                .with_context(|| format!("invalid APP__ERROR_DISMISS_MS '{v}'"))?;
        }

        if let Some(v) = var("APP__LOG_LEVEL") {
            self.log_level = v;
        }

        Ok(())
    }
}

/// Defaults, then the config file, then environment overrides.
///
/// A missing file is only an error when its path was given explicitly.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    load_settings_with(config_path, Path::new(DEFAULT_CONFIG_PATH), |key| {
        std::env::var(key).ok()
    })
}

fn load_settings_with(
    config_path: Option<&Path>,
    default_path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = Settings::default();
    let path = config_path.unwrap_or(default_path);

    match fs::read_to_string(path) {
        Ok(raw) => settings
            .apply_file(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    settings.apply_env(var)?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
