use fleetwatch_core::{MetricKind, MetricSeries, Violation, ViolationKind};
use serde::{Deserialize, Serialize};

/// 比较方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 最大值大于阈值
    GreaterThan,
    /// 最小值小于阈值
    LessThan,
}

/// 阈值配置（百分比）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_high: f64,
    pub cpu_low: f64,
    pub disk_high: f64,
    pub memory_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_high: 80.0,
            cpu_low: 10.0,
            disk_high: 70.0,
            memory_high: 80.0,
        }
    }
}

/// 单条阈值规则
///
/// 用窗口内的极值判断是否触发，上报的却是最新样本。
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    kind: ViolationKind,
    metric: MetricKind,
    threshold: f64,
    comparison: Comparison,
}

impl ThresholdRule {
    pub fn new(kind: ViolationKind, metric: MetricKind, threshold: f64, comparison: Comparison) -> Self {
        Self {
            kind,
            metric,
            threshold,
            comparison,
        }
    }

    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, series: &MetricSeries) -> Option<Violation> {
        let triggered = match self.comparison {
            Comparison::GreaterThan => series.max()? > self.threshold,
            Comparison::LessThan => series.min()? < self.threshold,
        };
        if !triggered {
            return None;
        }

        let reported = round_half_even(series.first()?);
        Some(Violation {
            kind: self.kind,
            threshold: self.threshold,
            reported,
            text: self.message(reported),
        })
    }

    fn message(&self, reported: i64) -> String {
        match self.kind {
            ViolationKind::CpuHigh => format!(
                "CPU usage exceeded {}%, current utilization {}%.",
                self.threshold, reported
            ),
            ViolationKind::CpuLow => format!(
                "CPU usage is below {}%, current utilization {}%.",
                self.threshold, reported
            ),
            ViolationKind::DiskHigh => format!(
                "Disk usage exceeded {}%, current utilization {}%.",
                self.threshold, reported
            ),
            ViolationKind::MemoryHigh => format!(
                "Memory usage exceeded {}%, current utilization {}%.",
                self.threshold, reported
            ),
        }
    }
}

/// 四舍六入五成双
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// 阈值评估器（纯函数，无副作用）
///
/// 规则顺序固定：CPU 高 / CPU 低（二选一）、磁盘高、内存高。
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    cpu_high: ThresholdRule,
    cpu_low: ThresholdRule,
    disk_high: ThresholdRule,
    memory_high: ThresholdRule,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            cpu_high: ThresholdRule::new(
                ViolationKind::CpuHigh,
                MetricKind::Cpu,
                thresholds.cpu_high,
                Comparison::GreaterThan,
            ),
            cpu_low: ThresholdRule::new(
                ViolationKind::CpuLow,
                MetricKind::Cpu,
                thresholds.cpu_low,
                Comparison::LessThan,
            ),
            disk_high: ThresholdRule::new(
                ViolationKind::DiskHigh,
                MetricKind::Disk,
                thresholds.disk_high,
                Comparison::GreaterThan,
            ),
            memory_high: ThresholdRule::new(
                ViolationKind::MemoryHigh,
                MetricKind::Memory,
                thresholds.memory_high,
                Comparison::GreaterThan,
            ),
        }
    }

    pub fn rules(&self) -> [&ThresholdRule; 4] {
        [&self.cpu_high, &self.cpu_low, &self.disk_high, &self.memory_high]
    }

    pub fn evaluate(
        &self,
        cpu: &MetricSeries,
        disk: &MetricSeries,
        memory: &MetricSeries,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        if let Some(v) = self.cpu_high.evaluate(cpu) {
            violations.push(v);
        } else if let Some(v) = self.cpu_low.evaluate(cpu) {
            violations.push(v);
        }

        if let Some(v) = self.disk_high.evaluate(disk) {
            violations.push(v);
        }

        if let Some(v) = self.memory_high.evaluate(memory) {
            violations.push(v);
        }

        violations
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
