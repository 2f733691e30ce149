//! Jira adapter — creates issues and comments through the REST API v2.

use async_trait::async_trait;
use flowclaw_core::config::JiraAdapterConfig;
use flowclaw_core::error::Result;
use flowclaw_core::traits::Adapter;
use flowclaw_core::types::{AdapterResult, Intent};

use crate::http::{into_result, transport_error};
use crate::registry::validate_context;

pub struct JiraAdapter {
    config: JiraAdapterConfig,
    client: reqwest::Client,
}

/// What a Jira intent resolves to.
#[derive(Debug, PartialEq)]
enum JiraOp {
    CreateIssue,
    Comment,
}

impl JiraOp {
    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "create" | "send" | "execute" => Some(JiraOp::CreateIssue),
            "comment" => Some(JiraOp::Comment),
            _ => None,
        }
    }

    fn required(&self) -> &'static [&'static str] {
        match self {
            JiraOp::CreateIssue => &["summary"],
            JiraOp::Comment => &["issue_key", "body"],
        }
    }
}

impl JiraAdapter {
    pub fn new(config: JiraAdapterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn project<'a>(&'a self, intent: &'a Intent) -> Option<&'a str> {
        intent
            .context_str("project")
            .or(self.config.default_project.as_deref())
    }

    fn issue_payload(project: &str, intent: &Intent) -> serde_json::Value {
        let mut fields = serde_json::json!({
            "project": { "key": project },
            "summary": intent.context_str("summary").unwrap_or_default(),
            "description": intent.context_str("description").unwrap_or_default(),
            "issuetype": { "name": intent.context_str("issue_type").unwrap_or("Task") },
        });
        if let Some(labels) = intent.context.get("labels").filter(|l| l.is_array()) {
            fields["labels"] = labels.clone();
        }
        if let Some(priority) = intent.context_str("priority") {
            fields["priority"] = serde_json::json!({ "name": priority });
        }
        serde_json::json!({ "fields": fields })
    }

    async fn post(&self, what: &str, path: &str, body: &serde_json::Value) -> Result<AdapterResult> {
        let resp = self
            .client
            .post(self.api_url(path))
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .json(body)
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;
        Ok(into_result(what, resp).await)
    }
}

#[async_trait]
impl Adapter for JiraAdapter {
    fn name(&self) -> &str {
        "jira"
    }

    async fn execute(&self, intent: &Intent) -> Result<AdapterResult> {
        let Some(op) = JiraOp::from_verb(&intent.intent) else {
            return Ok(AdapterResult::invalid(&format!(
                "jira: unsupported intent '{}'",
                intent.intent
            )));
        };
        if let Err(e) = validate_context(intent, op.required()) {
            return Ok(AdapterResult::invalid(&format!("jira: {e}")));
        }

        match op {
            JiraOp::CreateIssue => {
                let Some(project) = self.project(intent) else {
                    return Ok(AdapterResult::invalid(
                        "jira: Missing required field(s): project",
                    ));
                };
                let body = Self::issue_payload(project, intent);
                self.post("Jira create issue", "issue", &body).await
            }
            JiraOp::Comment => {
                let key = intent.context_str("issue_key").unwrap_or_default();
                let body = serde_json::json!({ "body": intent.context_str("body").unwrap_or_default() });
                self.post("Jira comment", &format!("issue/{key}/comment"), &body)
                    .await
            }
        }
    }
}
