//! Persistent settings for the CLI.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`,
//! with environment variables taking precedence.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::agent::AgentConfig;
use crate::model::{ModelConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Pricing vendor key; empty uses the provider detected from `base_url`
    pub vendor: String,
    /// Model API base URL
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    /// ADB device ID; empty picks the first ready device
    pub device_id: String,
    /// Language code ("cn" or "en")
    pub lang: String,
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    pub max_steps: u32,
    pub step_delay_ms: u64,
    pub action_delay_ms: u64,
    /// Summarize every N steps, 0 disables
    pub summarize_every: u32,
    pub enable_billing: bool,
    /// YAML pricing table; empty uses built-in pricing
    pub pricing_config: String,
    /// Ask the operator after every step
    pub operator_intervention: bool,
    /// YAML profile file; empty looks for `profiles.yaml` in the config dir
    pub profiles_config: String,
    /// Profile to use; empty selects the file's `default_profile`
    pub profile: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        let model = ModelConfig::default();
        let agent = AgentConfig::default();
        Self {
            vendor: String::new(),
            base_url: model.base_url,
            api_key: model.api_key,
            model_name: model.model_name,
            device_id: String::new(),
            lang: agent.lang,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            max_steps: agent.max_steps,
            step_delay_ms: agent.step_delay.as_millis() as u64,
            action_delay_ms: agent.action_delay.as_millis() as u64,
            summarize_every: agent.summarize_every,
            enable_billing: agent.enable_billing,
            pricing_config: String::new(),
            operator_intervention: agent.operator_intervention,
            profiles_config: String::new(),
            profile: String::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "moderras", "phone-pilot")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring settings at {}: {}", path.display(), e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override fields from environment variables (`MODEL_BASE_URL`,
    /// `ADB_DEVICE_ID`, `MAX_STEPS`, `PRICING_CONFIG` and friends).
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = env::var("MODEL_VENDOR") {
            self.vendor = v;
        }
        if let Ok(v) = env::var("MODEL_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = env::var("MODEL_API_KEY") {
            self.api_key = v;
        }
        if let Ok(v) = env::var("MODEL_NAME") {
            self.model_name = v;
        }
        if let Ok(v) = env::var("ADB_DEVICE_ID") {
            self.device_id = v;
        }
        if let Ok(v) = env::var("AGENT_LANG") {
            self.lang = v;
        }
        if let Ok(v) = env::var("PRICING_CONFIG") {
            self.pricing_config = v;
        }
        if let Ok(v) = env::var("PROFILES_CONFIG") {
            self.profiles_config = v;
        }
        if let Ok(v) = env::var("MODEL_PROFILE") {
            self.profile = v;
        }
        self.max_retries = env_parse("MODEL_MAX_RETRIES").unwrap_or(self.max_retries);
        self.retry_delay = env_parse("MODEL_RETRY_DELAY").unwrap_or(self.retry_delay);
        self.max_steps = env_parse("MAX_STEPS").unwrap_or(self.max_steps);
        self.summarize_every = env_parse("SUMMARIZE_EVERY").unwrap_or(self.summarize_every);
        self.enable_billing = env_flag("BILLING_ENABLED").unwrap_or(self.enable_billing);
        self.operator_intervention = env_flag("OPERATOR_INTERVENTION").unwrap_or(self.operator_intervention);
        self
    }

    pub fn to_model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_vendor(self.vendor.trim())
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig::default()
            .with_lang(&self.lang)
            .with_max_steps(self.max_steps)
            .with_step_delay(Duration::from_millis(self.step_delay_ms))
            .with_action_delay(Duration::from_millis(self.action_delay_ms))
            .with_summarize_every(self.summarize_every)
            .with_billing(self.enable_billing)
            .with_operator_intervention(self.operator_intervention)
    }

    /// Configured device id, if any.
    pub fn device_id(&self) -> Option<&str> {
        Some(self.device_id.trim()).filter(|id| !id.is_empty())
    }

    /// Configured pricing file, if any.
    pub fn pricing_path(&self) -> Option<&Path> {
        Some(self.pricing_config.trim())
            .filter(|p| !p.is_empty())
            .map(Path::new)
    }

    /// Profile file to load: the configured one, else `profiles.yaml` in the
    /// config dir when it exists.
    pub fn profiles_path(&self) -> Option<PathBuf> {
        match self.profiles_config.trim() {
            "" => Self::config_dir()
                .map(|dir| dir.join("profiles.yaml"))
                .filter(|path| path.exists()),
            path => Some(PathBuf::from(path)),
        }
    }

    /// Configured profile name, if any.
    pub fn profile_name(&self) -> Option<&str> {
        Some(self.profile.trim()).filter(|name| !name.is_empty())
    }
}
