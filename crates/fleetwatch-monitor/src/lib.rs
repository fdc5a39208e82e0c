pub mod builder;
pub mod cycle;
pub mod report;
pub mod service;
pub mod sources;

pub use builder::{build_cycle, build_metric_source, build_notify_manager, build_state_store};
pub use cycle::{alert_subject, compose_body, CycleSettings, FleetAlertCycle};
pub use report::{CycleReport, CycleSummary, InstanceFailure, InstanceOutcome};
pub use service::{MonitorService, MonitorTaskHandle};
pub use sources::{HttpMetricSource, StaticInventory, GROUP_TAG};
