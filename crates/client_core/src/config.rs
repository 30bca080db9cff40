use std::{fs, io, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Texts shown when an operation fails without a server-supplied message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorMessages {
    pub timeout: String,
    pub server_error: String,
    pub not_found: String,
    pub fallback: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            timeout: "The request took too long. Please try again.".into(),
            server_error: "Internal server error. Please try again later.".into(),
            not_found: "The requested resource was not found.".into(),
            fallback: "Something went wrong while loading data.".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout_ms: u64,
    pub max_toasts: usize,
    pub toast_duration_ms: u64,
    pub error_toast_duration_ms: u64,
    pub debounce_ms: u64,
    pub messages: ErrorMessages,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000/api".into(),
            request_timeout_ms: 10_000,
            max_toasts: 1,
            toast_duration_ms: 4_000,
            error_toast_duration_ms: 6_000,
            debounce_ms: 300,
            messages: ErrorMessages::default(),
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    pub fn error_toast_duration(&self) -> Duration {
        Duration::from_millis(self.error_toast_duration_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AGENDA_SERVER_URL") {
            self.server_url = v;
        }
        if let Ok(v) = std::env::var("APP__SERVER_URL") {
            self.server_url = v;
        }

        override_parsed("APP__REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms);
        override_parsed("APP__MAX_TOASTS", &mut self.max_toasts);
        override_parsed("APP__TOAST_DURATION_MS", &mut self.toast_duration_ms);
        override_parsed(
            "APP__ERROR_TOAST_DURATION_MS",
            &mut self.error_toast_duration_ms,
        );
        override_parsed("APP__DEBOUNCE_MS", &mut self.debounce_ms);

        // A zero cap would make every toast invisible.
        self.max_toasts = self.max_toasts.max(1);
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable settings override"),
    }
}

/// Loads `client.toml` from the working directory if present, then applies
/// environment overrides. A malformed file is logged and skipped.
pub fn load_settings() -> ClientSettings {
    match load_settings_from(DEFAULT_SETTINGS_FILE) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "falling back to default client settings");
            let mut settings = ClientSettings::default();
            settings.apply_env_overrides();
            settings
        }
    }
}

/// Like [`load_settings`] but reports a malformed file. A missing file is
/// not an error.
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<ClientSettings, SettingsError> {
    let path = path.as_ref();
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => ClientSettings::default(),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };
    settings.apply_env_overrides();
    Ok(settings)
}

fn parse_settings(raw: &str) -> Result<ClientSettings, toml::de::Error> {
    toml::from_str(raw)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
