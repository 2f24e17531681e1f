use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::PushoverConfig;
use crate::models::AvailabilityEvent;
use crate::plugins::traits::{NotificationResult, Notifier};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    request: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Sends availability events through the Pushover messages API.
pub struct PushoverNotifier {
    client: Client,
    api_url: String,
    user: String,
    token: String,
}

impl PushoverNotifier {
    pub fn new(config: &PushoverConfig) -> Result<Self> {
        let user = config
            .user
            .clone()
            .ok_or_else(|| AppError::Validation("Pushover user key is not configured".to_string()))?;
        let token = config
            .token
            .clone()
            .ok_or_else(|| AppError::Validation("Pushover API token is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            user,
            token,
        })
    }

    fn create_payload(&self, event: &AvailabilityEvent) -> serde_json::Value {
        json!({
            "token": self.token,
            "user": self.user,
            "title": format!("😄{} available", event.name),
            "message": format!("{} available ➡️ {}", event.name, event.url),
            "url": event.url,
            "timestamp": event.detected_at.timestamp(),
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, event: &AvailabilityEvent) -> Result<NotificationResult> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&self.create_payload(event))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<PushoverResponse> = serde_json::from_str(&body).ok();

        match parsed {
            Some(reply) if status.is_success() && reply.status == 1 => Ok(NotificationResult {
                message_id: reply.request,
            }),
            Some(reply) => Err(AppError::Notification(format!(
                "Pushover rejected message ({}): {}",
                status,
                reply.errors.join(", ")
            ))),
            None => Err(AppError::Notification(format!(
                "Unexpected Pushover response ({}): {}",
                status, body
            ))),
        }
    }
}
