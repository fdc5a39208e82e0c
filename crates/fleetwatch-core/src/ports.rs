//! 告警核心依赖的外部协作者接口
//!
//! 实例枚举、指标查询、状态持久化、通知投递都只通过这些 trait 访问，
//! 具体实现由调用方在构造时注入。

use crate::error::Result;
use crate::instance::{InstanceContext, InstanceId, TagSelector};
use crate::metric::{MetricQuery, MetricSeries};
use crate::state::AlertRecord;
use crate::violation::NotificationCategory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 实例枚举
#[async_trait]
pub trait InstanceInventory: Send + Sync {
    /// 按标签精确匹配列出实例，保持枚举顺序
    async fn list_instances(&self, selector: &TagSelector) -> Result<Vec<InstanceContext>>;
}

/// 指标源
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// 查询指标，样本按时间倒序返回
    async fn query(&self, query: &MetricQuery) -> Result<MetricSeries>;
}

/// 告警状态存储
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// 读取实例的上次告警记录，不存在返回 None
    async fn get(&self, instance_id: &InstanceId) -> Result<Option<AlertRecord>>;

    /// 覆盖写入上次告警时间
    async fn put(&self, instance_id: &InstanceId, time: DateTime<Utc>) -> Result<()>;
}

/// 通知投递
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, subject: &str, body: &str, category: NotificationCategory) -> Result<()>;
}
