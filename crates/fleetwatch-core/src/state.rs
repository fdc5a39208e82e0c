use crate::instance::InstanceId;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 告警时间戳写入格式（UTC，微秒，无时区后缀）
pub const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// 持久化的告警状态行
///
/// 时间戳保留原始字符串，解析交给冷却判定，以便区分损坏数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub instance_id: InstanceId,
    pub last_alert_time: String,
}

impl AlertRecord {
    pub fn new(instance_id: InstanceId, last_alert_time: impl Into<String>) -> Self {
        Self {
            instance_id,
            last_alert_time: last_alert_time.into(),
        }
    }

    pub fn at(instance_id: InstanceId, time: DateTime<Utc>) -> Self {
        Self::new(instance_id, format_alert_timestamp(time))
    }

    pub fn parse_time(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        parse_alert_timestamp(&self.last_alert_time)
    }
}

pub fn format_alert_timestamp(time: DateTime<Utc>) -> String {
    time.format(ALERT_TIMESTAMP_FORMAT).to_string()
}

/// 解析告警时间戳，兼容 RFC 3339 与无时区的 ISO-8601（视为 UTC）
pub fn parse_alert_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
}
