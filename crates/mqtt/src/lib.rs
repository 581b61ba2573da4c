pub mod config;
pub mod client;
pub mod delivery;
pub mod error;
pub mod policy;
pub mod subscription;

pub use config::MqttConfig;
pub use client::{MqttEvent, MqttService};
pub use delivery::{AckHandle, Acker, Delivery};
pub use error::{MqttError, ProvisionError};
pub use policy::{classify, ErrorClass};
pub use subscription::{ensure_subscription, SubscriptionAdmin, SubscriptionStatus};
