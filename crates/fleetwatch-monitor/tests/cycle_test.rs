use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetwatch_alert::CooldownGate;
use fleetwatch_config::CorruptStatePolicy;
use fleetwatch_core::{
    format_alert_timestamp, AlertRecord, AlertStateStore, FailureKind, FixedClock,
    InstanceContext, InstanceId, InstanceInventory, MetricKind, MetricQuery, MetricSeries,
    MetricSource, NotificationCategory, NotificationSink, Result, TagSelector, WatchError,
};
use fleetwatch_monitor::{CycleReport, CycleSettings, FleetAlertCycle};
use fleetwatch_state::FileStateStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type CallLog = Arc<Mutex<Vec<String>>>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ============================================================================
// 记录调用的测试替身
// ============================================================================

struct FakeInventory {
    instances: Vec<InstanceContext>,
    fail: bool,
    entered: Option<Arc<Notify>>,
    release: Option<Arc<Notify>>,
    log: CallLog,
}

#[async_trait]
impl InstanceInventory for FakeInventory {
    async fn list_instances(&self, selector: &TagSelector) -> Result<Vec<InstanceContext>> {
        self.log.lock().unwrap().push(format!("list:{}", selector));
        if let (Some(entered), Some(release)) = (&self.entered, &self.release) {
            entered.notify_one();
            release.notified().await;
        }
        if self.fail {
            return Err(WatchError::Internal("access denied".to_string()));
        }
        Ok(self.instances.clone())
    }
}

#[derive(Default)]
struct FakeMetrics {
    series: HashMap<(String, MetricKind), Vec<f64>>,
    failing: HashSet<MetricKind>,
    queries: Mutex<Vec<MetricQuery>>,
    /// 每次查询推进的时钟，模拟慢后端
    slow_clock: Option<Arc<FixedClock>>,
    log: CallLog,
}

#[async_trait]
impl MetricSource for FakeMetrics {
    async fn query(&self, query: &MetricQuery) -> Result<MetricSeries> {
        let instance_id = query.dimensions.instance_id().to_string();
        self.log
            .lock()
            .unwrap()
            .push(format!("query:{}:{}", instance_id, query.kind));
        self.queries.lock().unwrap().push(query.clone());
        if let Some(clock) = &self.slow_clock {
            clock.advance(Duration::minutes(1));
        }

        if self.failing.contains(&query.kind) {
            return Err(WatchError::metric_fetch(
                query.kind.metric_name(),
                "backend unavailable",
            ));
        }
        let samples = self
            .series
            .get(&(instance_id, query.kind))
            .cloned()
            .unwrap_or_default();
        Ok(MetricSeries::new(query.kind, samples))
    }
}

#[derive(Default)]
struct FakeStore {
    records: Mutex<HashMap<InstanceId, String>>,
    fail_put: bool,
    log: CallLog,
}

impl FakeStore {
    fn raw(&self, id: &str) -> Option<String> {
        self.records.lock().unwrap().get(&InstanceId::new(id)).cloned()
    }
}

#[async_trait]
impl AlertStateStore for FakeStore {
    async fn get(&self, instance_id: &InstanceId) -> Result<Option<AlertRecord>> {
        self.log.lock().unwrap().push(format!("get:{}", instance_id));
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(instance_id)
            .map(|v| AlertRecord::new(instance_id.clone(), v.clone())))
    }

    async fn put(&self, instance_id: &InstanceId, time: DateTime<Utc>) -> Result<()> {
        self.log.lock().unwrap().push(format!("put:{}", instance_id));
        if self.fail_put {
            return Err(WatchError::Persist("table unavailable".to_string()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(instance_id.clone(), format_alert_timestamp(time));
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Sent {
    subject: String,
    body: String,
    category: NotificationCategory,
}

#[derive(Default)]
struct FakeSink {
    fail_for: HashSet<String>,
    sent: Mutex<Vec<Sent>>,
    log: CallLog,
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn send(&self, subject: &str, body: &str, category: NotificationCategory) -> Result<()> {
        self.log.lock().unwrap().push(format!("send:{}", subject));
        if self.fail_for.iter().any(|id| subject.ends_with(id.as_str())) {
            return Err(WatchError::Notify("topic unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            subject: subject.to_string(),
            body: body.to_string(),
            category,
        });
        Ok(())
    }
}

// ============================================================================
// 组装
// ============================================================================

struct Harness {
    log: CallLog,
    instances: Vec<InstanceContext>,
    inventory_fails: bool,
    metrics: FakeMetrics,
    store: FakeStore,
    sink: FakeSink,
    policy: CorruptStatePolicy,
    slow_metrics: bool,
}

struct Built {
    cycle: Arc<FleetAlertCycle>,
    clock: Arc<FixedClock>,
    metrics: Arc<FakeMetrics>,
    store: Arc<FakeStore>,
    sink: Arc<FakeSink>,
    log: CallLog,
}

impl Harness {
    fn new() -> Self {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        Self {
            metrics: FakeMetrics {
                log: log.clone(),
                ..Default::default()
            },
            store: FakeStore {
                log: log.clone(),
                ..Default::default()
            },
            sink: FakeSink {
                log: log.clone(),
                ..Default::default()
            },
            log,
            instances: Vec::new(),
            inventory_fails: false,
            policy: CorruptStatePolicy::Alert,
            slow_metrics: false,
        }
    }

    fn instance(mut self, id: &str) -> Self {
        self.instances
            .push(InstanceContext::new(id, "ami-123", "m5.xlarge").with_group("eks-prd"));
        self
    }

    fn ungrouped_instance(mut self, id: &str) -> Self {
        self.instances
            .push(InstanceContext::new(id, "ami-123", "m5.xlarge"));
        self
    }

    fn samples(mut self, id: &str, kind: MetricKind, values: &[f64]) -> Self {
        self.metrics
            .series
            .insert((id.to_string(), kind), values.to_vec());
        self
    }

    fn failing_metric(mut self, kind: MetricKind) -> Self {
        self.metrics.failing.insert(kind);
        self
    }

    fn last_alert(self, id: &str, raw: impl Into<String>) -> Self {
        self.store
            .records
            .lock()
            .unwrap()
            .insert(InstanceId::new(id), raw.into());
        self
    }

    fn failing_put(mut self) -> Self {
        self.store.fail_put = true;
        self
    }

    fn failing_send(mut self, id: &str) -> Self {
        self.sink.fail_for.insert(id.to_string());
        self
    }

    fn failing_inventory(mut self) -> Self {
        self.inventory_fails = true;
        self
    }

    fn policy(mut self, policy: CorruptStatePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn slow_metrics(mut self) -> Self {
        self.slow_metrics = true;
        self
    }

    fn build(self) -> Built {
        self.build_with_inventory_gate(None, None)
    }

    fn build_with_inventory_gate(
        self,
        entered: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    ) -> Built {
        let inventory = Arc::new(FakeInventory {
            instances: self.instances,
            fail: self.inventory_fails,
            entered,
            release,
            log: self.log.clone(),
        });
        let clock = Arc::new(FixedClock::new(t0()));
        let mut metrics = self.metrics;
        if self.slow_metrics {
            metrics.slow_clock = Some(clock.clone());
        }
        let metrics = Arc::new(metrics);
        let store = Arc::new(self.store);
        let sink = Arc::new(self.sink);

        let mut settings = CycleSettings::new(TagSelector::new("Name", "EKS-PRD"), "Sinapse PRD");
        settings.corrupt_state_policy = self.policy;

        let cycle = FleetAlertCycle::new(
            settings,
            inventory,
            metrics.clone(),
            store.clone(),
            sink.clone(),
        )
        .with_gate(CooldownGate::new(Duration::minutes(60)))
        .with_clock(clock.clone());

        Built {
            cycle: Arc::new(cycle),
            clock,
            metrics,
            store,
            sink,
            log: self.log,
        }
    }
}

// ============================================================================
// 用例
// ============================================================================

#[tokio::test]
async fn test_quiet_cycle_sends_nothing_and_never_persists() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[50.0])
        .samples("i-1", MetricKind::Disk, &[40.0])
        .samples("i-1", MetricKind::Memory, &[60.0])
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.quiet, 1);
    assert_eq!(summary.alerted, 0);
    assert!(built.sink.sent.lock().unwrap().is_empty());
    assert!(!calls(&built.log).iter().any(|c| c.starts_with("put:")));
}

#[tokio::test]
async fn test_empty_series_is_never_a_violation() {
    let built = Harness::new().instance("i-1").build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.quiet, 1);
    assert!(built.sink.sent.lock().unwrap().is_empty());
    assert!(built.store.raw("i-1").is_none());
}

#[tokio::test]
async fn test_violation_sends_once_then_persists_window_end() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[85.0, 82.0])
        .build();

    let summary = built.cycle.run().await.unwrap();
    assert_eq!(summary.alerted, 1);

    let log = calls(&built.log);
    assert_eq!(
        log,
        vec![
            "list:tag:Name=EKS-PRD".to_string(),
            "get:i-1".to_string(),
            "query:i-1:cpu".to_string(),
            "query:i-1:disk".to_string(),
            "query:i-1:memory".to_string(),
            "send:Sinapse PRD - instance alert: i-1".to_string(),
            "put:i-1".to_string(),
        ]
    );

    let sent = built.sink.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Sinapse PRD - instance alert: i-1");
    assert_eq!(sent[0].body, "CPU usage exceeded 80%, current utilization 85%.");
    assert_eq!(sent[0].category, NotificationCategory::High);
    assert_eq!(sent[0].category.as_str(), "high");

    assert_eq!(
        built.store.raw("i-1"),
        Some("2024-03-01T12:00:00.000000".to_string())
    );
}

#[tokio::test]
async fn test_body_joins_violations_in_rule_order() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Memory, &[91.4])
        .samples("i-1", MetricKind::Disk, &[75.0])
        .samples("i-1", MetricKind::Cpu, &[5.0, 50.0])
        .build();

    built.cycle.run().await.unwrap();

    let sent = built.sink.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].body,
        "CPU usage is below 10%, current utilization 5%.\n\n\
         Disk usage exceeded 70%, current utilization 75%.\n\n\
         Memory usage exceeded 80%, current utilization 91%."
    );
}

#[tokio::test]
async fn test_notify_failure_never_persists() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[95.0])
        .failing_send("i-1")
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.alerted, 0);
    assert_eq!(summary.failures_of(FailureKind::Notify).count(), 1);
    assert!(!calls(&built.log).iter().any(|c| c.starts_with("put:")));
    assert!(built.store.raw("i-1").is_none());
}

#[tokio::test]
async fn test_cooldown_short_circuits_metric_fetch() {
    let recent = format_alert_timestamp(t0() - Duration::minutes(30));
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .last_alert("i-1", recent.clone())
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.muted, 1);
    assert!(built.metrics.queries.lock().unwrap().is_empty());
    assert!(built.sink.sent.lock().unwrap().is_empty());
    assert_eq!(built.store.raw("i-1"), Some(recent));
}

#[tokio::test]
async fn test_cooldown_boundary_is_inclusive() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .last_alert("i-1", format_alert_timestamp(t0() - Duration::minutes(60)))
        .build();

    let summary = built.cycle.run().await.unwrap();
    assert_eq!(summary.alerted, 1);
}

#[tokio::test]
async fn test_quiet_cycle_does_not_reset_cooldown_clock() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .build();

    assert_eq!(built.cycle.run().await.unwrap().alerted, 1);

    built.clock.advance(Duration::minutes(30));
    assert_eq!(built.cycle.run().await.unwrap().muted, 1);

    built.clock.advance(Duration::minutes(30));
    let summary = built.cycle.run().await.unwrap();
    assert_eq!(summary.alerted, 1);
    assert_eq!(built.sink.sent.lock().unwrap().len(), 2);
    assert_eq!(
        built.store.raw("i-1"),
        Some("2024-03-01T13:00:00.000000".to_string())
    );
}

#[tokio::test]
async fn test_corrupt_state_alert_policy_overwrites_bad_row() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Disk, &[88.0])
        .last_alert("i-1", "not-a-timestamp")
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.corrupt_state, 1);
    assert_eq!(summary.failures_of(FailureKind::CorruptState).count(), 1);
    assert_eq!(
        built.store.raw("i-1"),
        Some("2024-03-01T12:00:00.000000".to_string())
    );
}

#[tokio::test]
async fn test_corrupt_state_skip_policy_isolates_instance() {
    let built = Harness::new()
        .instance("i-1")
        .instance("i-2")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .samples("i-2", MetricKind::Cpu, &[99.0])
        .last_alert("i-1", "garbage")
        .policy(CorruptStatePolicy::Skip)
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.alerted, 1);
    assert!(!calls(&built.log).contains(&"query:i-1:cpu".to_string()));
    assert_eq!(built.store.raw("i-1"), Some("garbage".to_string()));
}

#[tokio::test]
async fn test_metric_fetch_failure_is_empty_series_and_reported() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .samples("i-1", MetricKind::Disk, &[75.0])
        .failing_metric(MetricKind::Cpu)
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.failures_of(FailureKind::MetricFetch).count(), 1);

    let sent = built.sink.sent.lock().unwrap().clone();
    assert_eq!(sent[0].body, "Disk usage exceeded 70%, current utilization 75%.");
}

#[tokio::test]
async fn test_persist_failure_after_send_is_reported() {
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .failing_put()
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.failures_of(FailureKind::Persist).count(), 1);
    assert_eq!(built.sink.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_per_instance_failures_do_not_abort_cycle() {
    let built = Harness::new()
        .instance("i-1")
        .instance("i-2")
        .instance("i-3")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .samples("i-2", MetricKind::Cpu, &[99.0])
        .samples("i-3", MetricKind::Cpu, &[99.0])
        .failing_send("i-2")
        .build();

    let summary = built.cycle.run().await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.alerted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].instance_id, InstanceId::new("i-2"));
    assert!(built.store.raw("i-1").is_some());
    assert!(built.store.raw("i-2").is_none());
    assert!(built.store.raw("i-3").is_some());
}

#[tokio::test]
async fn test_enumeration_order_is_preserved() {
    let built = Harness::new()
        .instance("i-c")
        .instance("i-a")
        .instance("i-b")
        .build();

    built.cycle.run().await.unwrap();

    let gets: Vec<_> = calls(&built.log)
        .into_iter()
        .filter(|c| c.starts_with("get:"))
        .collect();
    assert_eq!(gets, vec!["get:i-c", "get:i-a", "get:i-b"]);
}

#[tokio::test]
async fn test_empty_fleet_is_success() {
    let built = Harness::new().build();

    let report = built.cycle.run_report().await;
    assert_eq!(report.status_code, 200);
    assert_eq!(report.summary.unwrap().processed, 0);
}

#[tokio::test]
async fn test_enumeration_failure_fails_cycle() {
    let built = Harness::new().instance("i-1").failing_inventory().build();

    let err = built.cycle.run().await.unwrap_err();
    assert!(matches!(err, WatchError::Enumeration(_)));

    let report = built.cycle.run_report().await;
    assert_eq!(report.status_code, 500);
    assert!(report.body.contains("access denied"));
    assert!(!calls(&built.log).iter().any(|c| c.starts_with("get:")));
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let built = Harness::new()
        .instance("i-1")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .build_with_inventory_gate(Some(entered.clone()), Some(release.clone()));

    let cycle = built.cycle.clone();
    let first = tokio::spawn(async move { cycle.run().await });
    entered.notified().await;

    let second = built.cycle.run().await;
    assert!(matches!(second, Err(WatchError::AlreadyRunning)));
    assert_eq!(
        CycleReport::from_result(Err(WatchError::AlreadyRunning)).status_code,
        409
    );

    release.notify_one();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.alerted, 1);
    assert_eq!(built.sink.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_absent_group_forwarded_as_explicit_empty_dimension() {
    let built = Harness::new()
        .ungrouped_instance("i-1")
        .samples("i-1", MetricKind::Disk, &[75.0])
        .build();

    let summary = built.cycle.run().await.unwrap();
    assert_eq!(summary.alerted, 1);

    let queries = built.metrics.queries.lock().unwrap().clone();
    for query in queries.iter().filter(|q| q.kind != MetricKind::Cpu) {
        let group = query
            .dimensions
            .pairs()
            .into_iter()
            .find(|d| d.name == "AutoScalingGroupName")
            .expect("group dimension must be present");
        assert_eq!(group.value, "");
    }

    let cpu = queries.iter().find(|q| q.kind == MetricKind::Cpu).unwrap();
    assert_eq!(cpu.dimensions.pairs().len(), 1);
}

#[tokio::test]
async fn test_lookback_window_ends_at_cycle_time() {
    let built = Harness::new().instance("i-1").build();

    built.cycle.run().await.unwrap();

    let queries = built.metrics.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 3);
    for query in &queries {
        assert_eq!(query.window.end, t0());
        assert_eq!(query.window.start, t0() - Duration::minutes(5));
        assert_eq!(query.period_secs, 300);
    }
}

#[tokio::test]
async fn test_each_instance_uses_its_own_window() {
    let built = Harness::new()
        .instance("i-1")
        .instance("i-2")
        .samples("i-1", MetricKind::Cpu, &[99.0])
        .samples("i-2", MetricKind::Cpu, &[99.0])
        .slow_metrics()
        .build();

    let summary = built.cycle.run().await.unwrap();
    assert_eq!(summary.alerted, 2);

    let queries = built.metrics.queries.lock().unwrap().clone();
    let ends = |id: &str| -> Vec<DateTime<Utc>> {
        queries
            .iter()
            .filter(|q| q.dimensions.instance_id().as_str() == id)
            .map(|q| q.window.end)
            .collect()
    };
    // 第一个实例的三次查询推进了 3 分钟
    assert_eq!(ends("i-1"), vec![t0(); 3]);
    assert_eq!(ends("i-2"), vec![t0() + Duration::minutes(3); 3]);

    assert_eq!(
        built.store.raw("i-1"),
        Some("2024-03-01T12:00:00.000000".to_string())
    );
    assert_eq!(
        built.store.raw("i-2"),
        Some("2024-03-01T12:03:00.000000".to_string())
    );
}

#[tokio::test]
async fn test_unreadable_state_file_never_floods_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{truncated").unwrap();

    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut metrics = FakeMetrics {
        log: log.clone(),
        ..Default::default()
    };
    metrics
        .series
        .insert(("i-1".to_string(), MetricKind::Cpu), vec![99.0]);
    let sink = Arc::new(FakeSink {
        log: log.clone(),
        ..Default::default()
    });
    let inventory = Arc::new(FakeInventory {
        instances: vec![InstanceContext::new("i-1", "ami-123", "m5.xlarge").with_group("eks-prd")],
        fail: false,
        entered: None,
        release: None,
        log: log.clone(),
    });
    let clock = Arc::new(FixedClock::new(t0()));

    let cycle = FleetAlertCycle::new(
        CycleSettings::new(TagSelector::new("Name", "EKS-PRD"), "Sinapse PRD"),
        inventory,
        Arc::new(metrics),
        Arc::new(FileStateStore::new(&path)),
        sink.clone(),
    )
    .with_gate(CooldownGate::new(Duration::minutes(60)))
    .with_clock(clock.clone());

    for _ in 0..3 {
        let summary = cycle.run().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.alerted, 0);
        assert_eq!(summary.corrupt_state, 0);
        assert_eq!(summary.failures_of(FailureKind::StateUnavailable).count(), 1);
        clock.advance(Duration::minutes(5));
    }

    assert!(sink.sent.lock().unwrap().is_empty());
    assert!(!calls(&log).iter().any(|c| c.starts_with("query:")));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{truncated");
}
