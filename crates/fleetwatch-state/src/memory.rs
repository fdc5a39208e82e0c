use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetwatch_core::{format_alert_timestamp, AlertRecord, AlertStateStore, InstanceId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 内存状态存储（单进程或测试使用）
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<RwLock<HashMap<InstanceId, String>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入原始时间戳字符串（可用于构造损坏数据）
    pub async fn insert_raw(&self, instance_id: impl Into<InstanceId>, value: impl Into<String>) {
        self.records
            .write()
            .await
            .insert(instance_id.into(), value.into());
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AlertStateStore for MemoryStateStore {
    async fn get(&self, instance_id: &InstanceId) -> Result<Option<AlertRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(instance_id)
            .map(|value| AlertRecord::new(instance_id.clone(), value.clone())))
    }

    async fn put(&self, instance_id: &InstanceId, time: DateTime<Utc>) -> Result<()> {
        let value = format_alert_timestamp(time);
        debug!(instance_id = %instance_id, last_alert_time = %value, "Alert state updated");
        self.records.write().await.insert(instance_id.clone(), value);
        Ok(())
    }
}
