use crate::message::{NotifyChannel, NotifyMessage};
use anyhow::Result;
use async_trait::async_trait;

/// 单个渠道的投递结果
///
/// `Err` 表示传输层错误（连接失败等），`Rejected` 表示对端明确拒收。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Rejected(String),
}

impl NotifyOutcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        NotifyOutcome::Rejected(reason.into())
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered)
    }
}

/// 通知器 trait
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyOutcome>;

    fn channel(&self) -> NotifyChannel;

    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }
}
