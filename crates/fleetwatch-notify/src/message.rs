use chrono::{DateTime, Utc};
use fleetwatch_core::NotificationCategory;
use serde::{Deserialize, Serialize};

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// 信息
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
    /// 严重
    Critical,
}

impl From<NotificationCategory> for NotifyLevel {
    fn from(category: NotificationCategory) -> Self {
        match category {
            NotificationCategory::High => NotifyLevel::Critical,
        }
    }
}

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotifyChannel {
    /// 邮件
    Email,
    /// Webhook
    Webhook,
    /// Slack
    Slack,
    /// 仅写日志
    Log,
}

/// 通知消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// 标题
    pub title: String,

    /// 内容
    pub content: String,

    /// 类别（随消息属性下发，例如 "high"）
    pub category: NotificationCategory,

    /// 级别
    pub level: NotifyLevel,

    /// 时间
    pub timestamp: DateTime<Utc>,
}

impl NotifyMessage {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category,
            level: category.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_level(mut self, level: NotifyLevel) -> Self {
        self.level = level;
        self
    }
}
