//! 实例枚举与指标查询的具体实现

pub mod http;
pub mod inventory;

pub use http::HttpMetricSource;
pub use inventory::{StaticInventory, GROUP_TAG};
