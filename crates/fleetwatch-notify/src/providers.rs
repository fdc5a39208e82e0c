use crate::message::{NotifyChannel, NotifyLevel, NotifyMessage};
use crate::notifier::{Notifier, NotifyOutcome};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

fn default_timeout_ms() -> u64 {
    5000
}

fn http_client(timeout_ms: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ============================================================================
// 邮件通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailNotifier {
    config: EmailConfig,
    enabled: bool,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        let enabled = !config.to.is_empty();
        Self { config, enabled }
    }

    fn body(message: &NotifyMessage) -> String {
        format!(
            "{}\n\nCategory: {}\nTime: {}",
            message.content,
            message.category,
            message.timestamp.to_rfc3339()
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyOutcome> {
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let mut builder = Message::builder()
            .from(self.config.from.parse()?)
            .subject(message.title.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.config.to {
            builder = builder.to(to.parse()?);
        }
        let email = builder.body(Self::body(message))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        match mailer.send(email).await {
            Ok(_) => Ok(NotifyOutcome::Delivered),
            Err(e) => Ok(NotifyOutcome::rejected(format!("Email send failed: {}", e))),
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Email
    }

    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        let client = http_client(config.timeout_ms);
        Self { config, client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyOutcome> {
        let mut request = self.client.post(&self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;

        if response.status().is_success() {
            Ok(NotifyOutcome::Delivered)
        } else {
            Ok(NotifyOutcome::rejected(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Webhook
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// Slack 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        let client = http_client(config.timeout_ms);
        Self { config, client }
    }

    fn build_message(message: &NotifyMessage) -> serde_json::Value {
        let color = match message.level {
            NotifyLevel::Info => "good",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error | NotifyLevel::Critical => "danger",
        };

        serde_json::json!({
            "attachments": [{
                "color": color,
                "title": message.title,
                "text": message.content,
                "fields": [
                    {
                        "title": "Category",
                        "value": message.category.as_str(),
                        "short": true
                    },
                    {
                        "title": "Time",
                        "value": message.timestamp.to_rfc3339(),
                        "short": true
                    }
                ]
            }]
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyOutcome> {
        let body = Self::build_message(message);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyOutcome::Delivered)
        } else {
            Ok(NotifyOutcome::rejected(format!(
                "Slack failed: {}",
                response.status()
            )))
        }
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Slack
    }

    fn name(&self) -> &str {
        "slack"
    }
}

// ============================================================================
// 日志通知（演练模式）
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyOutcome> {
        warn!(
            category = %message.category,
            title = %message.title,
            "ALERT\n{}",
            message.content
        );
        Ok(NotifyOutcome::Delivered)
    }

    fn channel(&self) -> NotifyChannel {
        NotifyChannel::Log
    }

    fn name(&self) -> &str {
        "log"
    }
}
