use crate::cycle::FleetAlertCycle;
use crate::report::CycleReport;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

/// 周期调度服务
pub struct MonitorService {
    cycle: Arc<FleetAlertCycle>,
    /// 周期间隔
    interval_secs: u64,
}

pub struct MonitorTaskHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl MonitorTaskHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

impl MonitorService {
    pub fn new(cycle: Arc<FleetAlertCycle>, interval_secs: u64) -> Self {
        Self {
            cycle,
            interval_secs: interval_secs.max(1),
        }
    }

    pub fn cycle(&self) -> &Arc<FleetAlertCycle> {
        &self.cycle
    }

    /// 立即执行一个周期
    pub async fn run_once(&self) -> CycleReport {
        self.cycle.run_report().await
    }

    /// 后台按间隔执行周期，首个周期立即开始
    pub fn start_monitoring_task(self: Arc<Self>) -> MonitorTaskHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join_handle = tokio::spawn(async move {
            info!(
                interval_secs = self.interval_secs,
                "Starting fleet monitoring task"
            );
            let mut ticker = interval(Duration::from_secs(self.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        if !report.is_success() {
                            warn!(status = report.status_code, "{}", report.body);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Fleet monitoring task stopped");
        });

        MonitorTaskHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleSettings;
    use crate::sources::StaticInventory;
    use async_trait::async_trait;
    use fleetwatch_core::{MetricQuery, MetricSeries, MetricSource, TagSelector};
    use fleetwatch_notify::NotifyManager;
    use fleetwatch_state::MemoryStateStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingMetrics {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricSource for CountingMetrics {
        async fn query(&self, query: &MetricQuery) -> fleetwatch_core::Result<MetricSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MetricSeries::empty(query.kind))
        }
    }

    fn service(metrics: Arc<CountingMetrics>) -> Arc<MonitorService> {
        let mut inventory = StaticInventory::new();
        let tags = HashMap::from([("Name".to_string(), "prd".to_string())]);
        inventory.add("i-1", "ami-1", "t3.large", tags);

        let cycle = FleetAlertCycle::new(
            CycleSettings::new(TagSelector::new("Name", "prd"), "test"),
            Arc::new(inventory),
            metrics,
            Arc::new(MemoryStateStore::new()),
            Arc::new(NotifyManager::default()),
        );
        Arc::new(MonitorService::new(Arc::new(cycle), 3600))
    }

    #[tokio::test]
    async fn test_run_once_reports_summary() {
        let metrics = Arc::new(CountingMetrics::default());
        let report = service(metrics.clone()).run_once().await;

        assert_eq!(report.status_code, 200);
        assert_eq!(report.summary.unwrap().quiet, 1);
        assert_eq!(metrics.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_task_runs_first_cycle_and_shuts_down() {
        let metrics = Arc::new(CountingMetrics::default());
        let handle = service(metrics.clone()).start_monitoring_task();

        for _ in 0..50 {
            if metrics.calls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(metrics.calls.load(Ordering::SeqCst), 3);
    }
}
