//! Shared settings for the prodichat CLI.
//! Persisted in the platform-specific config directory via `directories::ProjectDirs`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
};

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Generative-language API key
    pub api_key: String,
    /// Model name
    pub model_name: String,
    /// Identity service web API key
    pub auth_api_key: String,
    /// Document database project ID (empty = in-memory history only)
    pub project_id: String,
    /// Per-installation app ID scoping persisted messages
    pub app_id: String,
    /// Pre-issued auth token (optional)
    pub auth_token: String,
    /// Total attempts per inference call
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff multiplier applied per retry
    pub backoff_multiplier: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: "gemini-2.5-flash-preview-05-20".to_string(),
            auth_api_key: String::new(),
            project_id: String::new(),
            app_id: "default-app-id".to_string(),
            auth_token: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "prodidows", "prodichat")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file.
    pub fn load() -> Self {
        let defaults = Self::default();

        let mut loaded: Self = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        // Backfill fields zeroed out by older config files
        if loaded.model_name.is_empty() {
            loaded.model_name = defaults.model_name;
        }
        if loaded.app_id.is_empty() {
            loaded.app_id = defaults.app_id;
        }
        if loaded.max_attempts == 0 {
            loaded.max_attempts = defaults.max_attempts;
        }
        if loaded.initial_delay_ms == 0 {
            loaded.initial_delay_ms = defaults.initial_delay_ms;
        }
        if loaded.backoff_multiplier <= 0.0 {
            loaded.backoff_multiplier = defaults.backoff_multiplier;
        }

        loaded
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir().ok_or("Cannot determine config directory")?;

        // Create config directory if it doesn't exist
        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("settings.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&path, content).map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Retry policy for inference calls, as configured.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = AppSettings::default();
        assert_eq!(settings.model_name, "gemini-2.5-flash-preview-05-20");
        assert_eq!(settings.app_id, "default-app-id");
        assert_eq!(settings.max_attempts, 3);
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let mut settings = AppSettings::default();
        settings.max_attempts = 5;
        settings.initial_delay_ms = 250;
        settings.backoff_multiplier = 3.0;

        let policy = settings.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_settings_roundtrip_json() {
        let settings = AppSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model_name, settings.model_name);
        assert_eq!(parsed.max_attempts, settings.max_attempts);
    }
}
