use rumqttc::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("mqtt client request failed: {0}")]
    Client(#[from] ClientError),
    #[error("broker connection failed permanently: {0}")]
    Fatal(String),
}

/// Failures from [`SubscriptionAdmin::create_subscription`](crate::SubscriptionAdmin).
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("subscription {0} already exists")]
    AlreadyExists(String),
    #[error("broker rejected subscription {subscription}: {reason}")]
    Rejected { subscription: String, reason: String },
    #[error("mqtt client request failed: {0}")]
    Client(#[from] ClientError),
    #[error(transparent)]
    Connection(#[from] MqttError),
}
