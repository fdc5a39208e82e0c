pub mod clock;
pub mod error;
pub mod instance;
pub mod metric;
pub mod ports;
pub mod state;
pub mod violation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{FailureKind, Result, WatchError};
pub use instance::{GroupDimension, InstanceContext, InstanceId, TagSelector};
pub use metric::{
    Dimension, DiskMount, LookbackWindow, MetricDimensions, MetricKind, MetricQuery, MetricSeries,
    Statistic, DEFAULT_LOOKBACK_MINUTES, DEFAULT_PERIOD_SECS,
};
pub use ports::{AlertStateStore, InstanceInventory, MetricSource, NotificationSink};
pub use state::{format_alert_timestamp, parse_alert_timestamp, AlertRecord, ALERT_TIMESTAMP_FORMAT};
pub use violation::{NotificationCategory, Violation, ViolationKind};
