use chrono::Duration;
use fleetwatch_alert::{Thresholds, DEFAULT_COOLDOWN_MINUTES};
use fleetwatch_core::{
    DiskMount, NotificationCategory, TagSelector, DEFAULT_LOOKBACK_MINUTES, DEFAULT_PERIOD_SECS,
};
use fleetwatch_logging::LoggingConfig;
use fleetwatch_notify::{EmailConfig, SlackConfig, WebhookConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// fleetwatch 全局配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetWatchConfig {
    pub target: TargetConfig,
    pub alert: AlertConfig,
    pub thresholds: Thresholds,
    pub disk: DiskMount,
    pub state: StateConfig,
    pub metrics: MetricsConfig,
    pub notify: NotifyConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub instances: Vec<InstanceSpec>,
}

/// 目标实例选择
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub tag_key: String,
    pub tag_value: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            tag_key: "Name".to_string(),
            tag_value: String::new(),
        }
    }
}

impl TargetConfig {
    pub fn selector(&self) -> TagSelector {
        TagSelector::new(self.tag_key.clone(), self.tag_value.clone())
    }
}

/// 状态损坏时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptStatePolicy {
    /// 记录告警日志并视为未静默，下次告警覆盖坏数据
    #[default]
    Alert,
    /// 跳过该实例并计为失败
    Skip,
}

/// 冷却与回溯窗口的上限（分钟），一年
pub const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

/// 告警配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 通知标题中的账号标识
    pub account_label: String,
    pub cooldown_minutes: i64,
    pub lookback_minutes: i64,
    pub period_secs: u32,
    pub category: NotificationCategory,
    pub corrupt_state_policy: CorruptStatePolicy,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            account_label: "fleetwatch".to_string(),
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
            period_secs: DEFAULT_PERIOD_SECS,
            category: NotificationCategory::High,
            corrupt_state_policy: CorruptStatePolicy::Alert,
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes.clamp(1, MAX_WINDOW_MINUTES))
    }

    pub fn lookback(&self) -> Duration {
        Duration::minutes(self.lookback_minutes.clamp(1, MAX_WINDOW_MINUTES))
    }
}

/// 状态存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub backend: StateBackend,
    pub path: Option<PathBuf>,
}

/// 指标后端
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5000,
        }
    }
}

/// 通知渠道
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook: Option<WebhookConfig>,
    pub email: Option<EmailConfig>,
    pub slack: Option<SlackConfig>,
    /// 告警写入日志（演练）
    pub log: bool,
}

impl NotifyConfig {
    pub fn has_channel(&self) -> bool {
        self.webhook.is_some() || self.email.is_some() || self.slack.is_some() || self.log
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 周期间隔（秒）
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// 配置文件中静态声明的实例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub instance_id: String,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl FleetWatchConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
