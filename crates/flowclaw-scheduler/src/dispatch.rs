//! Alert dispatch — forwards engine errors to configured channels.
//! Supports: Telegram Bot API, Discord Webhook, HTTP Webhook.
//! Fire-and-forget: failures are reported to the caller, never retried.

use flowclaw_core::config::NotifyConfig;
use flowclaw_core::error::{FlowClawError, Result};
use flowclaw_core::types::ErrorInfo;

/// Alert target configuration.
#[derive(Debug, Clone)]
pub enum AlertTarget {
    /// Telegram Bot API — send via `sendMessage`.
    Telegram { bot_token: String, chat_id: String },
    /// Discord Webhook URL.
    Discord { webhook_url: String },
    /// Generic HTTP webhook — POST with JSON body.
    Webhook {
        url: String,
        headers: Vec<(String, String)>,
    },
}

/// Dispatch an error alert to a target channel.
pub async fn dispatch(alert: &ErrorInfo, target: &AlertTarget) -> Result<()> {
    match target {
        AlertTarget::Telegram { bot_token, chat_id } => send_telegram(bot_token, chat_id, alert).await,
        AlertTarget::Discord { webhook_url } => send_discord(webhook_url, alert).await,
        AlertTarget::Webhook { url, headers } => send_webhook(url, headers, alert).await,
    }
}

fn title(alert: &ErrorInfo) -> String {
    match &alert.step_name {
        Some(step) => format!("Workflow {} failed at step '{}'", alert.workflow_id, step),
        None => format!("Workflow {} failed", alert.workflow_id),
    }
}

/// Send alert via Telegram Bot API.
async fn send_telegram(bot_token: &str, chat_id: &str, alert: &ErrorInfo) -> Result<()> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);
    let text = format!(
        "🚨 *{}*\n\n{}\n\n_Execution: {} • {}_",
        escape_markdown(&title(alert)),
        escape_markdown(&alert.error),
        escape_markdown(alert.execution_id.as_deref().unwrap_or("-")),
        alert.timestamp.format("%H:%M:%S UTC")
    );

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        }))
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| FlowClawError::Http(format!("Telegram send failed: {e}")))?;

    if resp.status().is_success() {
        tracing::info!("✅ Telegram alert sent: {}", alert.workflow_id);
        Ok(())
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(FlowClawError::Http(format!("Telegram API error {status}: {body}")))
    }
}

/// Send alert via Discord Webhook.
async fn send_discord(webhook_url: &str, alert: &ErrorInfo) -> Result<()> {
    let client = reqwest::Client::new();
    let resp = client
        .post(webhook_url)
        .json(&serde_json::json!({
            "embeds": [{
                "title": title(alert),
                "description": alert.error,
                "color": 0xFF0000,
                "footer": {
                    "text": format!(
                        "Execution: {} • {}",
                        alert.execution_id.as_deref().unwrap_or("-"),
                        alert.timestamp.format("%H:%M:%S UTC")
                    )
                }
            }]
        }))
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| FlowClawError::Http(format!("Discord send failed: {e}")))?;

    if resp.status().is_success() {
        tracing::info!("✅ Discord alert sent: {}", alert.workflow_id);
        Ok(())
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(FlowClawError::Http(format!("Discord webhook error {status}: {body}")))
    }
}

/// Send alert via generic HTTP webhook.
async fn send_webhook(url: &str, headers: &[(String, String)], alert: &ErrorInfo) -> Result<()> {
    let client = reqwest::Client::new();
    let mut req = client
        .post(url)
        .json(&serde_json::json!({
            "title": title(alert),
            "workflow_id": alert.workflow_id,
            "execution_id": alert.execution_id,
            "step_id": alert.step_id,
            "error": alert.error,
            "timestamp": alert.timestamp.to_rfc3339(),
        }))
        .timeout(std::time::Duration::from_secs(10));

    for (key, value) in headers {
        req = req.header(key.as_str(), value.as_str());
    }

    let resp = req
        .send()
        .await
        .map_err(|e| FlowClawError::Http(format!("Webhook send failed: {e}")))?;

    if resp.status().is_success() {
        tracing::info!("✅ Webhook alert sent to {}", url);
        Ok(())
    } else {
        Err(FlowClawError::Http(format!("Webhook error {}", resp.status())))
    }
}

/// Escape Telegram MarkdownV1 special characters.
fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}

/// Dispatch to every target, in order.
pub async fn dispatch_all(
    alert: &ErrorInfo,
    targets: &[(String, AlertTarget)],
) -> Vec<(String, Result<()>)> {
    let mut results = Vec::with_capacity(targets.len());
    for (name, target) in targets {
        let result = dispatch(alert, target).await;
        results.push((name.clone(), result));
    }
    results
}

/// Build alert targets from the `[notify]` section.
pub fn targets_from_config(config: &NotifyConfig) -> Vec<(String, AlertTarget)> {
    let mut targets = Vec::new();

    if let (Some(token), Some(chat_id)) = (&config.telegram_bot_token, &config.telegram_chat_id) {
        if !token.is_empty() && !chat_id.is_empty() {
            targets.push((
                "telegram".to_string(),
                AlertTarget::Telegram {
                    bot_token: token.clone(),
                    chat_id: chat_id.clone(),
                },
            ));
        }
    }

    if let Some(url) = config.discord_webhook_url.as_ref().filter(|u| !u.is_empty()) {
        targets.push((
            "discord".to_string(),
            AlertTarget::Discord {
                webhook_url: url.clone(),
            },
        ));
    }

    if let Some(url) = config.webhook_url.as_ref().filter(|u| !u.is_empty()) {
        targets.push((
            "webhook".to_string(),
            AlertTarget::Webhook {
                url: url.clone(),
                headers: config
                    .webhook_headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
        ));
    }

    targets
}
