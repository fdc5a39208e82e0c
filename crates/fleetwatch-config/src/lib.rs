pub mod loader;
pub mod settings;

pub use loader::{validate, ConfigLoader, ENV_PREFIX};
pub use settings::{
    AlertConfig, CorruptStatePolicy, FleetWatchConfig, InstanceSpec, MetricsConfig, NotifyConfig,
    ScheduleConfig, StateBackend, StateConfig, TargetConfig, MAX_WINDOW_MINUTES,
};
