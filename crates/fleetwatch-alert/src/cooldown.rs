use chrono::{DateTime, Duration, Utc};
use fleetwatch_core::{AlertRecord, AlertStateStore, InstanceId, Result, WatchError};
use tracing::debug;

/// 默认冷却时间（分钟）
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

/// 冷却门
///
/// 同一实例两次告警之间至少间隔 `window`，边界（恰好等于）视为放行。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownGate {
    window: Duration,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 根据已有状态判断是否允许再次告警
    pub fn allowed(
        &self,
        instance_id: &InstanceId,
        record: Option<&AlertRecord>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.remaining(instance_id, record, now)?.is_none())
    }

    /// 剩余静默时间，None 表示已放行
    pub fn remaining(
        &self,
        instance_id: &InstanceId,
        record: Option<&AlertRecord>,
        now: DateTime<Utc>,
    ) -> Result<Option<Duration>> {
        let Some(record) = record else {
            return Ok(None);
        };

        let last = record.parse_time().map_err(|e| WatchError::CorruptState {
            instance_id: instance_id.to_string(),
            value: record.last_alert_time.clone(),
            reason: e.to_string(),
        })?;

        let elapsed = now - last;
        if elapsed >= self.window {
            Ok(None)
        } else {
            Ok(Some(self.window - elapsed))
        }
    }

    /// 读取存储并判断
    pub async fn check(
        &self,
        store: &dyn AlertStateStore,
        instance_id: &InstanceId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let record = store.get(instance_id).await?;
        match self.remaining(instance_id, record.as_ref(), now)? {
            None => Ok(true),
            Some(left) => {
                debug!(
                    instance_id = %instance_id,
                    remaining_secs = left.num_seconds(),
                    "Instance still in cooldown"
                );
                Ok(false)
            }
        }
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}
