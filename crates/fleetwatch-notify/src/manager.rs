use crate::message::{NotifyChannel, NotifyLevel, NotifyMessage};
use crate::notifier::{Notifier, NotifyOutcome};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fleetwatch_core::{NotificationCategory, NotificationSink, WatchError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 一次广播的投递汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// 低于最小级别而未发送
    pub filtered: bool,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }
}

/// 通知管理器
///
/// 广播到所有已注册渠道，至少一个渠道投递成功才算成功。
pub struct NotifyManager {
    notifiers: Arc<RwLock<HashMap<NotifyChannel, Box<dyn Notifier>>>>,
    min_level: NotifyLevel,
}

impl NotifyManager {
    pub fn new(min_level: NotifyLevel) -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(HashMap::new())),
            min_level,
        }
    }

    /// 注册通知器（同一渠道后注册的覆盖先注册的）
    pub async fn register(&self, notifier: Box<dyn Notifier>) {
        let mut notifiers = self.notifiers.write().await;
        info!("Registered notifier: {}", notifier.name());
        notifiers.insert(notifier.channel(), notifier);
    }

    pub async fn channel_count(&self) -> usize {
        self.notifiers.read().await.len()
    }

    /// 发送到所有渠道
    pub async fn broadcast(&self, message: &NotifyMessage) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();

        if !self.should_notify(message.level) {
            report.filtered = true;
            return Ok(report);
        }

        let notifiers = self.notifiers.read().await;
        if notifiers.is_empty() {
            return Err(anyhow!("no notification channel registered"));
        }

        for notifier in notifiers.values() {
            if !notifier.is_enabled() {
                continue;
            }

            match notifier.send(message).await {
                Ok(NotifyOutcome::Delivered) => {
                    info!("Notification sent via {}: {}", notifier.name(), message.title);
                    report.delivered.push(notifier.name().to_string());
                }
                Ok(NotifyOutcome::Rejected(reason)) => {
                    error!("Notification failed via {}: {}", notifier.name(), reason);
                    report.failed.push((notifier.name().to_string(), reason));
                }
                Err(e) => {
                    error!("Notification error via {}: {}", notifier.name(), e);
                    report.failed.push((notifier.name().to_string(), e.to_string()));
                }
            }
        }

        if !report.any_delivered() {
            let reasons = report
                .failed
                .iter()
                .map(|(name, reason)| format!("{}: {}", name, reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(anyhow!("no channel delivered the notification ({})", reasons));
        }

        if !report.failed.is_empty() {
            warn!(
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                "Notification partially delivered"
            );
        }

        Ok(report)
    }

    /// 发送告警，被级别过滤也视为未送达
    pub async fn deliver(&self, message: &NotifyMessage) -> fleetwatch_core::Result<DeliveryReport> {
        let report = self
            .broadcast(message)
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        if report.filtered {
            warn!(
                level = ?message.level,
                min_level = ?self.min_level,
                "Alert filtered below minimum notify level"
            );
            return Err(WatchError::Notify(format!(
                "notification level {:?} is below minimum {:?}",
                message.level, self.min_level
            )));
        }
        Ok(report)
    }

    fn should_notify(&self, level: NotifyLevel) -> bool {
        level >= self.min_level
    }
}

impl Default for NotifyManager {
    fn default() -> Self {
        Self::new(NotifyLevel::Info)
    }
}

#[async_trait]
impl NotificationSink for NotifyManager {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        category: NotificationCategory,
    ) -> fleetwatch_core::Result<()> {
        let message = NotifyMessage::new(subject, body, category);
        self.deliver(&message).await.map(|_| ())
    }
}
