use async_trait::async_trait;
use sodamixer_core::{SubscriptionPath, TopicPath};
use tracing::info;

use crate::error::ProvisionError;

#[async_trait]
pub trait SubscriptionAdmin: Send + Sync {
    /// Creates `subscription` on `topic`. Must report an existing
    /// subscription as [`ProvisionError::AlreadyExists`] without duplicating it.
    async fn create_subscription(
        &self,
        subscription: &SubscriptionPath,
        topic: &TopicPath,
    ) -> Result<(), ProvisionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Created,
    Existing,
}

/// Makes sure the subscription exists; only "already exists" is tolerated.
pub async fn ensure_subscription<A: SubscriptionAdmin + ?Sized>(
    admin: &A,
    subscription: &SubscriptionPath,
    topic: &TopicPath,
) -> Result<SubscriptionStatus, ProvisionError> {
    match admin.create_subscription(subscription, topic).await {
        Ok(()) => {
            info!(%subscription, %topic, "Subscription created");
            Ok(SubscriptionStatus::Created)
        }
        Err(ProvisionError::AlreadyExists(_)) => {
            info!(%subscription, "Subscription already exists, listening to existing subscription");
            Ok(SubscriptionStatus::Existing)
        }
        Err(err) => Err(err),
    }
}
