// Resource naming for the order feed, mirroring the cloud pub/sub layout.

use std::fmt;

pub const DEFAULT_PROJECT: &str = "sodamixer-cc5ba";
pub const DEFAULT_TOPIC: &str = "SodaMixerMessages";
pub const DEFAULT_SUBSCRIPTION: &str = "SodaMixerMessages_subscriber";

pub fn topic_path(project: &str, topic: &str) -> String {
    format!("projects/{}/topics/{}", project, topic)
}

pub fn subscription_path(project: &str, subscription: &str) -> String {
    format!("projects/{}/subscriptions/{}", project, subscription)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    project: String,
    topic: String,
}

impl TopicPath {
    pub fn new(project: impl Into<String>, topic: impl Into<String>) -> Self {
        Self { project: project.into(), topic: topic.into() }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.topic
    }
}

impl Default for TopicPath {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT, DEFAULT_TOPIC)
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&topic_path(&self.project, &self.topic))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPath {
    project: String,
    subscription: String,
}

impl SubscriptionPath {
    pub fn new(project: impl Into<String>, subscription: impl Into<String>) -> Self {
        Self { project: project.into(), subscription: subscription.into() }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.subscription
    }
}

impl Default for SubscriptionPath {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT, DEFAULT_SUBSCRIPTION)
    }
}

impl fmt::Display for SubscriptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&subscription_path(&self.project, &self.subscription))
    }
}
