pub mod manager;
pub mod message;
pub mod notifier;
pub mod providers;

pub use manager::{DeliveryReport, NotifyManager};
pub use message::{NotifyChannel, NotifyLevel, NotifyMessage};
pub use notifier::{Notifier, NotifyOutcome};
pub use providers::{
    EmailConfig, EmailNotifier, LogNotifier, SlackConfig, SlackNotifier, WebhookConfig,
    WebhookNotifier,
};
