//! FlowClaw configuration system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{FlowClawError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowClawConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

impl FlowClawConfig {
    /// Load config from the default path (~/.flowclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowClawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FlowClawError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("📋 Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FlowClawError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        tracing::info!("💾 Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FlowClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowclaw")
    }
}

/// Expand `~` and `$VAR`/`${VAR}` in a configured path.
/// An unset variable leaves the path with only `~` expanded.
pub fn expand_path(p: &str) -> PathBuf {
    match shellexpand::full(p) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            tracing::warn!("⚠️ Could not expand {p}: {e}");
            PathBuf::from(shellexpand::tilde(p).into_owned())
        }
    }
}

fn bool_true() -> bool { true }

/// Execution engine retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 500 }
fn default_max_delay_ms() -> u64 { 30_000 }
fn default_backoff_multiplier() -> f64 { 2.0 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Recurring timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Allow a tick to start a run while the previous one is still going.
    #[serde(default)]
    pub allow_overlap: bool,
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,
}

fn default_interval_secs() -> u64 { 3600 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            allow_overlap: false,
            default_interval_secs: default_interval_secs(),
        }
    }
}

/// Execution store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String { "sqlite".into() }
fn default_store_path() -> String { "~/.flowclaw/executions.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

/// Broadcaster and error-alert settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Extra headers sent with every `webhook_url` alert.
    #[serde(default)]
    pub webhook_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
}

fn default_history_size() -> usize { 100 }
fn default_channel_capacity() -> usize { 256 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            channel_capacity: default_channel_capacity(),
            webhook_url: None,
            webhook_headers: BTreeMap::new(),
            discord_webhook_url: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

/// Per-adapter settings. Adapters register only when enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub telegram: Option<TelegramAdapterConfig>,
    #[serde(default)]
    pub discord: Option<DiscordAdapterConfig>,
    #[serde(default)]
    pub jira: Option<JiraAdapterConfig>,
    #[serde(default)]
    pub webhook: WebhookAdapterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramAdapterConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub bot_token: String,
    /// Used when a step does not set `chat_id`.
    #[serde(default)]
    pub default_chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordAdapterConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Used when a step does not set `webhook_url`.
    #[serde(default)]
    pub default_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraAdapterConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// e.g. https://acme.atlassian.net
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    #[serde(default)]
    pub default_project: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAdapterConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    /// Block cloud metadata and loopback targets.
    #[serde(default = "bool_true")]
    pub block_internal: bool,
}

fn default_webhook_timeout() -> u64 { 15 }

impl Default for WebhookAdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_webhook_timeout(),
            block_internal: true,
        }
    }
}
