//! Generic HTTP webhook adapter.

use async_trait::async_trait;
use flowclaw_core::config::WebhookAdapterConfig;
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::traits::Adapter;
use flowclaw_core::types::{AdapterResult, Intent};

use crate::http::{into_result, is_blocked_url, transport_error};
use crate::registry::check_required;

pub struct WebhookAdapter {
    config: WebhookAdapterConfig,
    client: reqwest::Client,
}

impl WebhookAdapter {
    pub fn new(config: WebhookAdapterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// HTTP method from context, else derived from the intent verb.
    fn method(intent: &Intent) -> Option<reqwest::Method> {
        let raw = intent
            .context_str("method")
            .map(|m| m.to_uppercase())
            .unwrap_or_else(|| match intent.intent.as_str() {
                "read" | "fetch" => "GET".into(),
                _ => "POST".into(),
            });
        match raw.as_str() {
            "GET" => Some(reqwest::Method::GET),
            "POST" => Some(reqwest::Method::POST),
            "PUT" => Some(reqwest::Method::PUT),
            "PATCH" => Some(reqwest::Method::PATCH),
            "DELETE" => Some(reqwest::Method::DELETE),
            _ => None,
        }
    }
}

#[async_trait]
impl Adapter for WebhookAdapter {
    fn name(&self) -> &str {
        "webhook"
    }

    fn required_fields(&self) -> &[&str] {
        &["url"]
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
        if let Some(invalid) = check_required(self, intent) {
            return Ok(invalid);
        }
        let url = intent.context_str("url").unwrap_or_default();
        if is_blocked_url(url, self.config.block_internal) {
            return Ok(AdapterResult::invalid(&format!(
                "webhook: blocked target {url}"
            )));
        }
        let Some(method) = Self::method(intent) else {
            return Ok(AdapterResult::invalid("webhook: unsupported HTTP method"));
        };

        let timeout = intent
            .context
            .get("timeout_secs")
            .and_then(|t| t.as_u64())
            .unwrap_or(self.config.timeout_secs);

        let mut req = self
            .client
            .request(method.clone(), url)
            .header("User-Agent", "FlowClaw/1.0")
            .timeout(std::time::Duration::from_secs(timeout));

        if let Some(headers) = intent.context.get("headers").and_then(|h| h.as_object()) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    req = req.header(key.as_str(), v);
                }
            }
        }

        req = match intent.context.get("body") {
            Some(serde_json::Value::String(s)) => req.body(s.clone()),
            Some(serde_json::Value::Null) | None => req,
            Some(other) => req.json(other),
        };

        tracing::debug!("🌐 Webhook {} {}", method, url);
        let resp = req.send().await.map_err(|e| {
            if e.is_builder() {
                FlowClawError::Adapter(format!("webhook: invalid request: {e}"))
            } else {
                transport_error("Webhook", e)
            }
        });

        match resp {
            Ok(resp) => Ok(into_result("Webhook", resp).await),
            // A malformed URL will never succeed.
            Err(FlowClawError::Adapter(msg)) => Ok(AdapterResult::invalid(&msg)),
            Err(e) => Err(e),
        }
    }
}
