use chrono::{DateTime, Utc};
use fleetwatch_core::{FailureKind, InstanceId, Result, WatchError};
use serde::{Deserialize, Serialize};

/// 单个实例在一个周期内的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "kind", rename_all = "kebab-case")]
pub enum InstanceOutcome {
    /// 冷却期内，未拉取指标
    Muted,
    /// 无越限
    Quiet,
    /// 已通知并写入状态
    Alerted,
    /// 已通知但状态写入失败
    AlertedUnpersisted,
    Failed(FailureKind),
}

/// 周期内记录的失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFailure {
    pub instance_id: InstanceId,
    pub kind: FailureKind,
    pub message: String,
}

/// 周期汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub processed: usize,
    pub muted: usize,
    pub alerted: usize,
    pub quiet: usize,
    pub failed: usize,
    /// 状态损坏但按策略继续告警的实例数
    pub corrupt_state: usize,
    pub failures: Vec<InstanceFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            muted: 0,
            alerted: 0,
            quiet: 0,
            failed: 0,
            corrupt_state: 0,
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn record(&mut self, outcome: InstanceOutcome) {
        self.processed += 1;
        match outcome {
            InstanceOutcome::Muted => self.muted += 1,
            InstanceOutcome::Quiet => self.quiet += 1,
            InstanceOutcome::Alerted | InstanceOutcome::AlertedUnpersisted => self.alerted += 1,
            InstanceOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn note_failure(&mut self, instance_id: &InstanceId, err: &WatchError) {
        self.failures.push(InstanceFailure {
            instance_id: instance_id.clone(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = at;
    }

    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &InstanceFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    /// 单行文本汇总
    pub fn line(&self) -> String {
        format!(
            "processed={} alerted={} muted={} quiet={} failed={} errors={}",
            self.processed,
            self.alerted,
            self.muted,
            self.quiet,
            self.failed,
            self.failures.len()
        )
    }
}

/// 调度方拿到的周期结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub status_code: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CycleSummary>,
}

impl CycleReport {
    pub const OK: u16 = 200;
    pub const CONFLICT: u16 = 409;
    pub const FAILED: u16 = 500;

    pub fn from_result(result: Result<CycleSummary>) -> Self {
        match result {
            Ok(summary) => Self {
                status_code: Self::OK,
                body: format!("Alert cycle completed: {}", summary.line()),
                summary: Some(summary),
            },
            Err(WatchError::AlreadyRunning) => Self {
                status_code: Self::CONFLICT,
                body: "Alert cycle skipped: another cycle is still running".to_string(),
                summary: None,
            },
            Err(e) => Self {
                status_code: Self::FAILED,
                body: format!("Alert cycle failed: {}", e),
                summary: None,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code < 300
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
