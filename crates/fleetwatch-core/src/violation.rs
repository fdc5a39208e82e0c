use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 违规类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    CpuHigh,
    CpuLow,
    DiskHigh,
    MemoryHigh,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::CpuHigh => "cpu-high",
            ViolationKind::CpuLow => "cpu-low",
            ViolationKind::DiskHigh => "disk-high",
            ViolationKind::MemoryHigh => "memory-high",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        NotificationCategory::High
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条违规消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub threshold: f64,
    /// 最新样本四舍五入后的值（不是触发用的极值）
    pub reported: i64,
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 通知类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    #[default]
    High,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::High => "high",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(NotificationCategory::High),
            other => Err(format!("unknown notification category: {}", other)),
        }
    }
}
