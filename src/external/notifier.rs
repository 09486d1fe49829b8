//! Webhook chat notifier
//!
//! Forwards detector outcome notes to a chat webhook (Discord/Slack style
//! JSON `content` payload). High-frequency messages (events, spreads,
//! blocks) are dropped here; only human-relevant notes go out.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::error::{EngineError, Result};
use crate::pipeline::Sink;
use crate::types::SinkMessage;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        WebhookNotifier {
            webhook_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Sink for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &SinkMessage) -> Result<()> {
        let SinkMessage::Note(note) = message else {
            return Ok(());
        };

        debug!("webhook notify: {note}");
        let stamped = format!("[{}] {note}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        self.client
            .post(&self.webhook_url)
            .json(&WebhookPayload { content: &stamped })
            .send()
            .await
            .map_err(|e| EngineError::Submit(format!("webhook: {e}")))?
            .error_for_status()
            .map_err(|e| EngineError::Submit(format!("webhook: {e}")))?;

        Ok(())
    }
}
