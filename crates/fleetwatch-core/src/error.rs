use serde::{Deserialize, Serialize};
use thiserror::Error;

/// fleetwatch 统一错误类型
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Instance enumeration failed: {0}")]
    Enumeration(String),

    #[error("Corrupt alert state for {instance_id}: {value:?} ({reason})")]
    CorruptState {
        instance_id: String,
        value: String,
        reason: String,
    },

    #[error("Metric fetch failed for {metric}: {reason}")]
    MetricFetch { metric: String, reason: String },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Persist failed: {0}")]
    Persist(String),

    #[error("Alert state unavailable: {0}")]
    StateUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Another alert cycle is already running")]
    AlreadyRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, WatchError>;

impl From<anyhow::Error> for WatchError {
    fn from(err: anyhow::Error) -> Self {
        WatchError::Internal(err.to_string())
    }
}

/// 失败分类，写入周期汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Enumeration,
    CorruptState,
    MetricFetch,
    Notify,
    Persist,
    StateUnavailable,
    Config,
    Io,
    Serialization,
    AlreadyRunning,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Enumeration => "enumeration",
            FailureKind::CorruptState => "corrupt-state",
            FailureKind::MetricFetch => "metric-fetch",
            FailureKind::Notify => "notify",
            FailureKind::Persist => "persist",
            FailureKind::StateUnavailable => "state-unavailable",
            FailureKind::Config => "config",
            FailureKind::Io => "io",
            FailureKind::Serialization => "serialization",
            FailureKind::AlreadyRunning => "already-running",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WatchError::Enumeration(_) => FailureKind::Enumeration,
            WatchError::CorruptState { .. } => FailureKind::CorruptState,
            WatchError::MetricFetch { .. } => FailureKind::MetricFetch,
            WatchError::Notify(_) => FailureKind::Notify,
            WatchError::Persist(_) => FailureKind::Persist,
            WatchError::StateUnavailable(_) => FailureKind::StateUnavailable,
            WatchError::Config(_) => FailureKind::Config,
            WatchError::Io(_) => FailureKind::Io,
            WatchError::Serialization(_) => FailureKind::Serialization,
            WatchError::AlreadyRunning => FailureKind::AlreadyRunning,
            WatchError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn metric_fetch(metric: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        WatchError::MetricFetch {
            metric: metric.into(),
            reason: reason.to_string(),
        }
    }
}
