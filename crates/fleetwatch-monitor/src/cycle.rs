//! 舰队告警周期
//!
//! 一次 `run` 按枚举顺序逐个处理实例：冷却检查 → 拉取指标 → 阈值评估 →
//! 通知 + 写状态。单个实例的失败只记入汇总，不中断整个周期；
//! 只有实例枚举失败才让周期整体失败。

use crate::report::{CycleReport, CycleSummary, InstanceOutcome};
use chrono::Duration;
use fleetwatch_alert::{CooldownGate, ThresholdEvaluator};
use fleetwatch_config::{CorruptStatePolicy, FleetWatchConfig};
use fleetwatch_core::{
    AlertStateStore, Clock, DiskMount, InstanceContext, InstanceInventory, LookbackWindow,
    MetricKind, MetricQuery, MetricSeries, MetricSource, NotificationCategory, NotificationSink,
    Result, SystemClock, TagSelector, Violation, WatchError, DEFAULT_LOOKBACK_MINUTES,
    DEFAULT_PERIOD_SECS,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// 周期参数
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub selector: TagSelector,
    pub account_label: String,
    pub lookback: Duration,
    pub period_secs: u32,
    pub disk_mount: DiskMount,
    pub corrupt_state_policy: CorruptStatePolicy,
    pub category: NotificationCategory,
}

impl CycleSettings {
    pub fn new(selector: TagSelector, account_label: impl Into<String>) -> Self {
        Self {
            selector,
            account_label: account_label.into(),
            lookback: Duration::minutes(DEFAULT_LOOKBACK_MINUTES),
            period_secs: DEFAULT_PERIOD_SECS,
            disk_mount: DiskMount::default(),
            corrupt_state_policy: CorruptStatePolicy::default(),
            category: NotificationCategory::High,
        }
    }

    pub fn from_config(config: &FleetWatchConfig) -> Self {
        Self {
            selector: config.target.selector(),
            account_label: config.alert.account_label.clone(),
            lookback: config.alert.lookback(),
            period_secs: config.alert.period_secs,
            disk_mount: config.disk.clone(),
            corrupt_state_policy: config.alert.corrupt_state_policy,
            category: config.alert.category,
        }
    }
}

/// 舰队告警周期
pub struct FleetAlertCycle {
    settings: CycleSettings,
    inventory: Arc<dyn InstanceInventory>,
    metrics: Arc<dyn MetricSource>,
    state: Arc<dyn AlertStateStore>,
    sink: Arc<dyn NotificationSink>,
    gate: CooldownGate,
    evaluator: ThresholdEvaluator,
    clock: Arc<dyn Clock>,
    run_lock: Mutex<()>,
}

impl FleetAlertCycle {
    pub fn new(
        settings: CycleSettings,
        inventory: Arc<dyn InstanceInventory>,
        metrics: Arc<dyn MetricSource>,
        state: Arc<dyn AlertStateStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            settings,
            inventory,
            metrics,
            state,
            sink,
            gate: CooldownGate::default(),
            evaluator: ThresholdEvaluator::default(),
            clock: Arc::new(SystemClock),
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_gate(mut self, gate: CooldownGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_evaluator(mut self, evaluator: ThresholdEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// 执行一个周期
    ///
    /// 周期之间互斥：上一个周期未结束时直接返回 `AlreadyRunning`。
    pub async fn run(&self) -> Result<CycleSummary> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| WatchError::AlreadyRunning)?;

        let mut summary = CycleSummary::new(self.clock.now());

        let instances = self
            .inventory
            .list_instances(&self.settings.selector)
            .await
            .map_err(|e| match e {
                WatchError::Enumeration(_) => e,
                other => WatchError::Enumeration(other.to_string()),
            })?;

        info!(
            selector = %self.settings.selector,
            count = instances.len(),
            "Starting alert cycle"
        );

        for ctx in &instances {
            // 每个实例单独取窗口，冷却检查、查询与写入共用同一时刻
            let window = LookbackWindow::ending_at(self.clock.now(), self.settings.lookback);
            let span = info_span!("instance", instance_id = %ctx.instance_id);
            let outcome = self
                .process_instance(ctx, window, &mut summary)
                .instrument(span)
                .await;
            summary.record(outcome);
        }

        summary.finish(self.clock.now());
        info!(
            processed = summary.processed,
            alerted = summary.alerted,
            muted = summary.muted,
            quiet = summary.quiet,
            failed = summary.failed,
            "Alert cycle finished"
        );

        Ok(summary)
    }

    /// 执行一个周期并转换为调度方使用的报告
    pub async fn run_report(&self) -> CycleReport {
        let result = self.run().await;
        if let Err(e) = &result {
            match e {
                WatchError::AlreadyRunning => warn!("{}", e),
                _ => error!("Alert cycle failed: {}", e),
            }
        }
        CycleReport::from_result(result)
    }

    async fn process_instance(
        &self,
        ctx: &InstanceContext,
        window: LookbackWindow,
        summary: &mut CycleSummary,
    ) -> InstanceOutcome {
        let instance_id = &ctx.instance_id;
        let now = window.end;

        match self.gate.check(self.state.as_ref(), instance_id, now).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Instance is in cooldown, skipping");
                return InstanceOutcome::Muted;
            }
            Err(e @ WatchError::CorruptState { .. })
                if self.settings.corrupt_state_policy == CorruptStatePolicy::Alert =>
            {
                warn!("{}; treating instance as not muted", e);
                summary.corrupt_state += 1;
                summary.note_failure(instance_id, &e);
            }
            Err(e) => {
                error!("Cooldown check failed: {}", e);
                summary.note_failure(instance_id, &e);
                return InstanceOutcome::Failed(e.kind());
            }
        }

        let cpu = self.fetch(MetricKind::Cpu, ctx, window, summary).await;
        let disk = self.fetch(MetricKind::Disk, ctx, window, summary).await;
        let memory = self.fetch(MetricKind::Memory, ctx, window, summary).await;

        let violations = self.evaluator.evaluate(&cpu, &disk, &memory);
        if violations.is_empty() {
            debug!("No threshold violated");
            return InstanceOutcome::Quiet;
        }

        let subject = self.subject(ctx);
        let body = compose_body(&violations);
        info!(violations = violations.len(), "Sending alert");

        if let Err(e) = self.sink.send(&subject, &body, self.settings.category).await {
            error!("Failed to send alert, state left untouched: {}", e);
            summary.note_failure(instance_id, &e);
            return InstanceOutcome::Failed(e.kind());
        }

        match self.state.put(instance_id, now).await {
            Ok(()) => InstanceOutcome::Alerted,
            Err(e) => {
                error!(
                    "Alert was delivered but persisting state failed, instance may alert again before cooldown ends: {}",
                    e
                );
                summary.note_failure(instance_id, &e);
                InstanceOutcome::AlertedUnpersisted
            }
        }
    }

    async fn fetch(
        &self,
        kind: MetricKind,
        ctx: &InstanceContext,
        window: LookbackWindow,
        summary: &mut CycleSummary,
    ) -> MetricSeries {
        let query = MetricQuery::for_instance(
            kind,
            ctx,
            &self.settings.disk_mount,
            window,
            self.settings.period_secs,
        );

        match self.metrics.query(&query).await {
            Ok(series) => {
                debug!(metric = %kind, samples = series.len(), "Fetched metric");
                series
            }
            Err(e) => {
                warn!(metric = %kind, "Metric fetch failed, treating series as empty: {}", e);
                summary.note_failure(&ctx.instance_id, &e);
                MetricSeries::empty(kind)
            }
        }
    }

    fn subject(&self, ctx: &InstanceContext) -> String {
        alert_subject(&self.settings.account_label, ctx)
    }
}

/// 通知标题
pub fn alert_subject(account_label: &str, ctx: &InstanceContext) -> String {
    format!("{} - instance alert: {}", account_label, ctx.instance_id)
}

/// 通知正文，越限描述之间空一行
pub fn compose_body(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
