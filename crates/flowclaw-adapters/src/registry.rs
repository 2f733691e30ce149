//! Adapter registry — tool name → adapter, fixed at wiring time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowclaw_core::config::AdaptersConfig;
use flowclaw_core::error::Result;
use flowclaw_core::traits::{Adapter, Dispatcher};
use flowclaw_core::types::{AdapterResult, Intent};

use crate::discord::DiscordAdapter;
use crate::jira::JiraAdapter;
use crate::telegram::TelegramAdapter;
use crate::webhook::WebhookAdapter;

/// Registry of all available adapters. Also the engine's dispatcher.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Build the registry from config. Only enabled adapters are registered.
    pub fn from_config(config: &AdaptersConfig) -> Self {
        let mut reg = Self::new();

        if config.webhook.enabled {
            reg.register(WebhookAdapter::new(config.webhook.clone()));
        }
        if let Some(tg) = &config.telegram {
            if tg.enabled && !tg.bot_token.is_empty() {
                reg.register(TelegramAdapter::new(tg.clone()));
            } else {
                tracing::debug!("Telegram adapter disabled or missing bot_token");
            }
        }
        if let Some(dc) = &config.discord {
            if dc.enabled {
                reg.register(DiscordAdapter::new(dc.clone()));
            }
        }
        if let Some(jira) = &config.jira {
            if jira.enabled && !jira.base_url.is_empty() {
                reg.register(JiraAdapter::new(jira.clone()));
            } else {
                tracing::debug!("Jira adapter disabled or missing base_url");
            }
        }

        reg
    }

    /// Register an adapter under its own name. Replaces any previous entry.
    pub fn register<A: Adapter + 'static>(&mut self, adapter: A) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn Adapter>) {
        let name = adapter.name().to_string();
        tracing::info!("🔌 Registered adapter: {}", name);
        if self.adapters.insert(name.clone(), adapter).is_some() {
            tracing::warn!("⚠️ Adapter '{}' was already registered — replaced", name);
        }
    }

    /// Get an adapter by tool name.
    pub fn get(&self, tool: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(tool)
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.adapters.contains_key(tool)
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn count(&self) -> usize {
        self.adapters.len()
    }
}

#[async_trait]
impl Dispatcher for AdapterRegistry {
    async fn dispatch(&self, intent: &Intent) -> Result<AdapterResult> {
        let Some(adapter) = self.adapters.get(&intent.tool) else {
            tracing::warn!("🚫 No adapter registered for tool '{}'", intent.tool);
            return Ok(AdapterResult::unsupported_tool());
        };
        tracing::debug!("➡️ Dispatching '{}' intent to {}", intent.intent, intent.tool);
        adapter.execute(intent).await
    }
}

/// Validate that an intent carries every required context field.
/// Null values and empty strings count as missing.
pub fn validate_context(intent: &Intent, required: &[&str]) -> std::result::Result<(), String> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| match intent.context.get(*key) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("Missing required field(s): {}", missing.join(", ")))
    }
}

/// Check an adapter's declared required fields.
/// Returns the non-retryable failure to hand back, if any.
pub fn check_required(adapter: &dyn Adapter, intent: &Intent) -> Option<AdapterResult> {
    validate_context(intent, adapter.required_fields())
        .err()
        .map(|e| AdapterResult::invalid(&format!("{}: {e}", adapter.name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowclaw_core::config::{JiraAdapterConfig, TelegramAdapterConfig};
    use flowclaw_core::error::FlowClawError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoAdapter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn name(&self) -> &str {
            "echo"
        }
        fn required_fields(&self) -> &[&str] {
            &["text"]
        }
        async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(invalid) = check_required(self, intent) {
                return Ok(invalid);
            }
            Ok(AdapterResult::ok(intent.context_str("text").unwrap_or_default()))
        }
    }

    struct FlakyAdapter;

    #[async_trait]
    impl Adapter for FlakyAdapter {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn execute(&self, _intent: &Intent) -> Result<AdapterResult> {
            Err(FlowClawError::Http("connection reset".into()))
        }
    }

    fn intent(tool: &str, context: serde_json::Value) -> Intent {
        Intent {
            agent_id: None,
            user_id: None,
            tool: tool.into(),
            intent: "send".into(),
            context: context.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reg = AdapterRegistry::new();
        reg.register(EchoAdapter { calls: calls.clone() });

        let result = reg
            .dispatch(&intent("echo", serde_json::json!({"text": "hello"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("hello"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_retryable() {
        let reg = AdapterRegistry::new();
        let result = reg
            .dispatch(&intent("unknown-tool", serde_json::json!({})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(!result.retryable);
        assert_eq!(result.message.as_deref(), Some("Unsupported tool"));
    }

    #[tokio::test]
    async fn test_missing_fields_reported_by_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reg = AdapterRegistry::new();
        reg.register(EchoAdapter { calls });

        let result = reg
            .dispatch(&intent("echo", serde_json::json!({"text": "  "})))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(!result.retryable);
        assert_eq!(
            result.error.as_deref(),
            Some("echo: Missing required field(s): text")
        );
    }

    #[tokio::test]
    async fn test_transient_error_propagates() {
        let mut reg = AdapterRegistry::new();
        reg.register(FlakyAdapter);
        let err = reg
            .dispatch(&intent("flaky", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowClawError::Http(_)));
    }

    #[test]
    fn test_validate_context() {
        let i = intent("x", serde_json::json!({"a": 1, "b": null, "c": ""}));
        assert!(validate_context(&i, &["a"]).is_ok());
        assert!(validate_context(&i, &[]).is_ok());
        let err = validate_context(&i, &["a", "b", "c", "d"]).unwrap_err();
        assert_eq!(err, "Missing required field(s): b, c, d");
    }

    #[test]
    fn test_from_config() {
        let mut config = AdaptersConfig::default();
        let reg = AdapterRegistry::from_config(&config);
        assert_eq!(reg.names(), vec!["webhook"]);

        config.telegram = Some(TelegramAdapterConfig {
            enabled: true,
            bot_token: "123:abc".into(),
            default_chat_id: None,
        });
        config.jira = Some(JiraAdapterConfig {
            enabled: false,
            base_url: "https://acme.atlassian.net".into(),
            email: "ops@acme.io".into(),
            api_token: "t".into(),
            default_project: None,
        });
        config.webhook.enabled = false;
        let reg = AdapterRegistry::from_config(&config);
        assert_eq!(reg.names(), vec!["telegram"]);
        assert!(!reg.contains("jira"));
        assert_eq!(reg.count(), 1);
    }
}
