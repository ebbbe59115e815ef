//! HTTP client for the assistant webhook.

use super::context::AssistantContext;
use crate::config::AssistantConfig;
use crate::models::ValidationError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Reply text used when the webhook answers without one.
const FALLBACK_REPLY: &str = "Response received";

/// Errors from the assistant proxy.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("assistant webhook is not configured")]
    NotConfigured,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Transport(String),

    #[error("assistant webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode assistant response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Payload posted to the webhook.
#[derive(Debug, Serialize)]
struct AssistantRequest<'a> {
    message: &'a str,
    context: &'a AssistantContext,
    timestamp: String,
}

/// Whatever the webhook sends back; every field is optional.
#[derive(Debug, Default, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    meta: Option<Value>,
}

/// Answer relayed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl From<WebhookResponse> for AssistantReply {
    fn from(response: WebhookResponse) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
        let reply = non_empty(response.reply)
            .or_else(|| non_empty(response.message))
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        Self {
            reply,
            meta: response.meta,
        }
    }
}

/// Posts questions to the assistant webhook.
pub struct AssistantClient {
    http_client: reqwest::Client,
    webhook_url: Option<String>,
    timeout_seconds: u64,
}

impl AssistantClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AssistantError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            webhook_url: config.webhook_url.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Send a question with its dashboard context and return the reply.
    pub async fn ask(
        &self,
        message: &str,
        context: &AssistantContext,
    ) -> Result<AssistantReply, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let url = self
            .webhook_url
            .as_deref()
            .ok_or(AssistantError::NotConfigured)?;

        let request = AssistantRequest {
            message,
            context,
            timestamp: Utc::now().to_rfc3339(),
        };
        debug!("Posting question to assistant ({} logs in context)", context.total_logs);

        let response = self
            .http_client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssistantError::Transport(format!(
                        "Request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    AssistantError::Transport(format!("Cannot connect to assistant at {}", url))
                } else {
                    AssistantError::Transport(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Status { status, body });
        }

        let body: WebhookResponse = response.json().await.map_err(AssistantError::Decode)?;
        info!("Assistant replied");

        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_from(value: Value) -> AssistantReply {
        serde_json::from_value::<WebhookResponse>(value).unwrap().into()
    }

    #[test]
    fn test_reply_field_preferred() {
        let reply = reply_from(json!({"reply": "42 pending", "message": "ignored"}));
        assert_eq!(reply.reply, "42 pending");
        assert_eq!(reply.meta, None);
    }

    #[test]
    fn test_message_field_fallback() {
        let reply = reply_from(json!({"reply": "", "message": "from message", "meta": {"tokens": 12}}));
        assert_eq!(reply.reply, "from message");
        assert_eq!(reply.meta, Some(json!({"tokens": 12})));
    }

    #[test]
    fn test_default_reply() {
        assert_eq!(reply_from(json!({})).reply, FALLBACK_REPLY);
    }

    #[test]
    fn test_request_payload_shape() {
        let context = AssistantContext::from_records(&[]);
        let request = AssistantRequest {
            message: "How many pending?",
            context: &context,
            timestamp: "2025-10-28T16:00:00+00:00".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "How many pending?");
        assert_eq!(json["context"]["totalLogs"], 0);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_ask_requires_message_and_webhook() {
        let unconfigured = AssistantClient::new(&AssistantConfig::default()).unwrap();
        let context = AssistantContext::from_records(&[]);

        let err = tokio_test::block_on(unconfigured.ask("  ", &context)).unwrap_err();
        assert!(matches!(
            err,
            AssistantError::Validation(ValidationError::EmptyMessage)
        ));

        let err = tokio_test::block_on(unconfigured.ask("hello", &context)).unwrap_err();
        assert!(matches!(err, AssistantError::NotConfigured));
    }
}
