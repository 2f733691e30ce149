//! Telegram adapter — sends messages via the Bot API.

use async_trait::async_trait;
use flowclaw_core::config::TelegramAdapterConfig;
use flowclaw_core::error::Result;
use flowclaw_core::traits::Adapter;
use flowclaw_core::types::{AdapterResult, Intent};

use crate::http::{into_result, transport_error};
use crate::registry::check_required;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramAdapter {
    config: TelegramAdapterConfig,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramAdapter {
    pub fn new(config: TelegramAdapterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }

    /// Point at a self-hosted Bot API server.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.config.bot_token, method)
    }

    fn chat_id<'a>(&'a self, intent: &'a Intent) -> Option<&'a str> {
        intent
            .context_str("chat_id")
            .or(self.config.default_chat_id.as_deref())
    }

    async fn send_message(&self, chat_id: &str, intent: &Intent) -> Result<AdapterResult> {
        let text = intent.context_str("text").unwrap_or_default();
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = intent.context_str("parse_mode") {
            body["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| transport_error("Telegram sendMessage", e))?;

        Ok(into_result("Telegram sendMessage", resp).await)
    }
}

#[async_trait]
impl Adapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    fn required_fields(&self) -> &[&str] {
        &["text"]
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
        if let Some(invalid) = check_required(self, intent) {
            return Ok(invalid);
        }
        let Some(chat_id) = self.chat_id(intent) else {
            return Ok(AdapterResult::invalid(
                "telegram: Missing required field(s): chat_id",
            ));
        };

        match intent.intent.as_str() {
            "send" | "notify" | "execute" => self.send_message(chat_id, intent).await,
            other => Ok(AdapterResult::invalid(&format!(
                "telegram: unsupported intent '{other}'"
            ))),
        }
    }
}
