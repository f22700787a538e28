//! Remote notification handler: POSTs progress snapshots to an HTTP endpoint.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HandlerError;
use crate::progress::aggregate::AggregateState;
use crate::progress::events::ProgressEvent;
use crate::progress::handlers::throttle::{RenderThrottle, ThrottleConfig};
use crate::progress::handlers::Handler;
use crate::progress::types::now;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_throttle")]
    pub throttle: ThrottleConfig,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_webhook_throttle() -> ThrottleConfig {
    ThrottleConfig {
        interval_ms: 2000,
        ..ThrottleConfig::default()
    }
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            throttle: default_webhook_throttle(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!("Webhook url must be http(s): {}", self.url));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Update,
    Finish,
}

/// Body of each notification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub done: u64,
    pub total: Option<u64>,
    pub percent: Option<f64>,
    pub message: Option<String>,
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn from_state(kind: NotificationKind, state: &AggregateState) -> Self {
        Self {
            kind,
            done: state.done,
            total: state.total,
            percent: state.percent(),
            message: state.message.clone(),
            label: state.label.clone(),
            timestamp: now(),
        }
    }
}

pub struct WebhookHandler {
    config: WebhookConfig,
    throttle: RenderThrottle,
    // Built on the dispatcher thread; the blocking client must not be created
    // inside an async runtime.
    client: Option<reqwest::blocking::Client>,
    sent: u64,
}

impl WebhookHandler {
    pub fn new(config: WebhookConfig) -> Self {
        let throttle = RenderThrottle::new(&config.throttle);
        Self {
            config,
            throttle,
            client: None,
            sent: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn client(&mut self) -> Result<&reqwest::blocking::Client, HandlerError> {
        if self.client.is_none() {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_millis(self.config.timeout_ms))
                .build()?;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| HandlerError::Closed("webhook client unavailable".to_string()))
    }

    fn post(&mut self, payload: &NotificationPayload) -> Result<(), HandlerError> {
        let url = self.config.url.clone();
        let response = self.client()?.post(&url).json(payload).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Rejected {
                status: status.as_u16(),
            });
        }
        self.sent += 1;
        debug!(url = %url, kind = ?payload.kind, "progress notification sent");
        Ok(())
    }
}

impl Handler for WebhookHandler {
    fn name(&self) -> &str {
        "webhook"
    }

    fn render(
        &mut self,
        _event: &ProgressEvent,
        state: &AggregateState,
    ) -> Result<(), HandlerError> {
        if !self.throttle.allow() {
            return Ok(());
        }
        let payload = NotificationPayload::from_state(NotificationKind::Update, state);
        self.post(&payload)
    }

    fn finalize(&mut self, state: &AggregateState) -> Result<(), HandlerError> {
        if state.events_received == 0 {
            return Ok(());
        }
        let payload = NotificationPayload::from_state(NotificationKind::Finish, state);
        self.post(&payload)
    }
}
