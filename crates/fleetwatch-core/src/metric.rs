use crate::instance::{GroupDimension, InstanceContext, InstanceId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认回溯窗口（分钟）
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 5;

/// 默认采样周期（秒）
pub const DEFAULT_PERIOD_SECS: u32 = 300;

/// 统计方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Maximum,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Average => "Average",
            Statistic::Maximum => "Maximum",
        }
    }
}

/// 监控的三类指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Disk,
    Memory,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Cpu, MetricKind::Disk, MetricKind::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Disk => "disk",
            MetricKind::Memory => "memory",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "AWS/EC2",
            MetricKind::Disk | MetricKind::Memory => "CWAgent",
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPUUtilization",
            MetricKind::Disk => "Disk_utilization",
            MetricKind::Memory => "Memory_utilization",
        }
    }

    pub fn statistic(&self) -> Statistic {
        match self {
            MetricKind::Cpu | MetricKind::Memory => Statistic::Average,
            MetricKind::Disk => Statistic::Maximum,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 磁盘挂载点维度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskMount {
    pub path: String,
    pub device: String,
    pub fstype: String,
}

impl Default for DiskMount {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            device: "nvme0n1p1".to_string(),
            fstype: "xfs".to_string(),
        }
    }
}

/// 指标查询维度（按指标区分，缺字段在编译期即可发现）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricDimensions {
    Instance {
        instance_id: InstanceId,
    },
    Host {
        instance_id: InstanceId,
        group: GroupDimension,
        image_id: String,
        instance_type: String,
    },
    Disk {
        instance_id: InstanceId,
        group: GroupDimension,
        image_id: String,
        instance_type: String,
        mount: DiskMount,
    },
}

/// 单个维度键值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

impl MetricDimensions {
    pub fn for_metric(kind: MetricKind, ctx: &InstanceContext, mount: &DiskMount) -> Self {
        match kind {
            MetricKind::Cpu => MetricDimensions::Instance {
                instance_id: ctx.instance_id.clone(),
            },
            MetricKind::Memory => MetricDimensions::Host {
                instance_id: ctx.instance_id.clone(),
                group: ctx.group_dimension(),
                image_id: ctx.image_id.clone(),
                instance_type: ctx.instance_type.clone(),
            },
            MetricKind::Disk => MetricDimensions::Disk {
                instance_id: ctx.instance_id.clone(),
                group: ctx.group_dimension(),
                image_id: ctx.image_id.clone(),
                instance_type: ctx.instance_type.clone(),
                mount: mount.clone(),
            },
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        match self {
            MetricDimensions::Instance { instance_id }
            | MetricDimensions::Host { instance_id, .. }
            | MetricDimensions::Disk { instance_id, .. } => instance_id,
        }
    }

    /// 按后端期望的顺序展开维度
    pub fn pairs(&self) -> Vec<Dimension> {
        match self {
            MetricDimensions::Instance { instance_id } => {
                vec![Dimension::new("InstanceId", instance_id.as_str())]
            }
            MetricDimensions::Host {
                instance_id,
                group,
                image_id,
                instance_type,
            } => vec![
                Dimension::new("InstanceId", instance_id.as_str()),
                Dimension::new("AutoScalingGroupName", group.value()),
                Dimension::new("ImageId", image_id.as_str()),
                Dimension::new("InstanceType", instance_type.as_str()),
            ],
            MetricDimensions::Disk {
                instance_id,
                group,
                image_id,
                instance_type,
                mount,
            } => vec![
                Dimension::new("path", mount.path.as_str()),
                Dimension::new("InstanceId", instance_id.as_str()),
                Dimension::new("AutoScalingGroupName", group.value()),
                Dimension::new("ImageId", image_id.as_str()),
                Dimension::new("InstanceType", instance_type.as_str()),
                Dimension::new("device", mount.device.as_str()),
                Dimension::new("fstype", mount.fstype.as_str()),
            ],
        }
    }
}

/// 回溯窗口 [start, end]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: end
                .checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
        }
    }
}

/// 指标查询
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub kind: MetricKind,
    pub dimensions: MetricDimensions,
    pub window: LookbackWindow,
    pub period_secs: u32,
    pub stat: Statistic,
}

impl MetricQuery {
    pub fn for_instance(
        kind: MetricKind,
        ctx: &InstanceContext,
        mount: &DiskMount,
        window: LookbackWindow,
        period_secs: u32,
    ) -> Self {
        Self {
            kind,
            dimensions: MetricDimensions::for_metric(kind, ctx, mount),
            window,
            period_secs,
            stat: kind.statistic(),
        }
    }
}

/// 指标样本序列（最新在前）
///
/// 实际每个周期通常只有 0 或 1 个样本，但不能假设长度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub kind: MetricKind,
    pub samples: Vec<f64>,
}

impl MetricSeries {
    pub fn new(kind: MetricKind, samples: Vec<f64>) -> Self {
        Self { kind, samples }
    }

    pub fn empty(kind: MetricKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// 最新样本
    pub fn first(&self) -> Option<f64> {
        self.samples.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        self.samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
    }
}
