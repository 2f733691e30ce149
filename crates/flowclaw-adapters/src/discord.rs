//! Discord adapter — posts to a channel webhook.

use async_trait::async_trait;
use flowclaw_core::config::DiscordAdapterConfig;
use flowclaw_core::error::Result;
use flowclaw_core::traits::Adapter;
use flowclaw_core::types::{AdapterResult, Intent};

use crate::http::{into_result, transport_error};
use crate::registry::check_required;

pub struct DiscordAdapter {
    config: DiscordAdapterConfig,
    client: reqwest::Client,
}

impl DiscordAdapter {
    pub fn new(config: DiscordAdapterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn webhook_url<'a>(&'a self, intent: &'a Intent) -> Option<&'a str> {
        intent
            .context_str("webhook_url")
            .or(self.config.default_webhook_url.as_deref())
    }

    /// Plain content, or an embed when a title is given.
    fn payload(intent: &Intent) -> serde_json::Value {
        let text = intent.context_str("text").unwrap_or_default();
        match intent.context_str("title") {
            Some(title) => serde_json::json!({
                "embeds": [{
                    "title": title,
                    "description": text,
                    "color": intent.context.get("color").and_then(|c| c.as_u64()).unwrap_or(0x00AAFF),
                }]
            }),
            None => serde_json::json!({ "content": text }),
        }
    }
}

#[async_trait]
impl Adapter for DiscordAdapter {
    fn name(&self) -> &str {
        "discord"
    }

    fn required_fields(&self) -> &[&str] {
        &["text"]
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
        if let Some(invalid) = check_required(self, intent) {
            return Ok(invalid);
        }
        let Some(url) = self.webhook_url(intent) else {
            return Ok(AdapterResult::invalid(
                "discord: Missing required field(s): webhook_url",
            ));
        };
        if !matches!(intent.intent.as_str(), "send" | "notify" | "execute") {
            return Ok(AdapterResult::invalid(&format!(
                "discord: unsupported intent '{}'",
                intent.intent
            )));
        }

        let resp = self
            .client
            .post(url)
            .json(&Self::payload(intent))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| transport_error("Discord webhook", e))?;

        Ok(into_result("Discord webhook", resp).await)
    }
}
