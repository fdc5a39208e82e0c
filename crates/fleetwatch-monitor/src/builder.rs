//! 根据配置组装告警周期的各个协作者

use crate::cycle::{CycleSettings, FleetAlertCycle};
use crate::sources::{HttpMetricSource, StaticInventory};
use anyhow::{anyhow, Result};
use fleetwatch_alert::{CooldownGate, ThresholdEvaluator};
use fleetwatch_config::{FleetWatchConfig, NotifyConfig, StateBackend, StateConfig};
use fleetwatch_core::{AlertStateStore, MetricSource};
use fleetwatch_notify::{
    EmailNotifier, LogNotifier, NotifyLevel, NotifyManager, SlackNotifier, WebhookNotifier,
};
use fleetwatch_state::{FileStateStore, MemoryStateStore};
use std::sync::Arc;
use tracing::{info, warn};

/// 构造状态存储
pub async fn build_state_store(config: &StateConfig) -> Result<Arc<dyn AlertStateStore>> {
    match config.backend {
        StateBackend::Memory => {
            warn!("Using in-memory alert state, cooldowns are lost on restart");
            Ok(Arc::new(MemoryStateStore::new()))
        }
        StateBackend::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("state.path is required for the file backend"))?;
            info!("Using file alert state: {}", path.display());
            Ok(Arc::new(FileStateStore::new(path)))
        }
        StateBackend::Sqlite => build_sqlite_store(config).await,
    }
}

#[cfg(feature = "sqlite")]
async fn build_sqlite_store(config: &StateConfig) -> Result<Arc<dyn AlertStateStore>> {
    let path = config
        .path
        .as_ref()
        .ok_or_else(|| anyhow!("state.path is required for the sqlite backend"))?;
    info!("Using sqlite alert state: {}", path.display());
    let store = fleetwatch_state::SqliteStateStore::open(path).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn build_sqlite_store(_config: &StateConfig) -> Result<Arc<dyn AlertStateStore>> {
    Err(anyhow!(
        "sqlite state backend requires the `sqlite` feature"
    ))
}

/// 构造通知管理器并注册配置中的渠道
pub async fn build_notify_manager(config: &NotifyConfig) -> NotifyManager {
    let manager = NotifyManager::new(NotifyLevel::Info);

    if let Some(webhook) = &config.webhook {
        manager
            .register(Box::new(WebhookNotifier::new(webhook.clone())))
            .await;
    }
    if let Some(email) = &config.email {
        manager
            .register(Box::new(EmailNotifier::new(email.clone())))
            .await;
    }
    if let Some(slack) = &config.slack {
        manager
            .register(Box::new(SlackNotifier::new(slack.clone())))
            .await;
    }
    if config.log {
        manager.register(Box::new(LogNotifier)).await;
    }

    if manager.channel_count().await == 0 {
        warn!("No notification channel configured, alerts will fail to deliver");
    }
    manager
}

/// 构造指标源
pub fn build_metric_source(config: &FleetWatchConfig) -> Result<Arc<dyn MetricSource>> {
    let endpoint = config
        .metrics
        .endpoint
        .as_ref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow!("metrics.endpoint must be configured"))?;
    Ok(Arc::new(HttpMetricSource::new(
        endpoint.clone(),
        config.metrics.timeout_ms,
    )))
}

/// 由完整配置构造告警周期
pub async fn build_cycle(config: &FleetWatchConfig) -> Result<FleetAlertCycle> {
    let inventory = Arc::new(StaticInventory::from_specs(&config.instances));
    if inventory.is_empty() {
        warn!("No instances declared in configuration");
    }

    let metrics = build_metric_source(config)?;
    let state = build_state_store(&config.state).await?;
    let sink = Arc::new(build_notify_manager(&config.notify).await);

    let cycle = FleetAlertCycle::new(
        CycleSettings::from_config(config),
        inventory,
        metrics,
        state,
        sink,
    )
    .with_gate(CooldownGate::new(config.alert.cooldown()))
    .with_evaluator(ThresholdEvaluator::new(config.thresholds));

    Ok(cycle)
}
