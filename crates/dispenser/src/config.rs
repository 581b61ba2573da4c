use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use sodamixer_core::{SubscriptionPath, TopicPath, DEFAULT_PROJECT, DEFAULT_SUBSCRIPTION, DEFAULT_TOPIC};
use sodamixer_mqtt::config::DEFAULT_MAX_IN_FLIGHT;

use crate::sequencer::DwellTimes;
use crate::serial::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PATH};

#[derive(Debug, Clone)]
pub struct DispenserConfig {
    pub topic: TopicPath,
    pub subscription: SubscriptionPath,
    pub serial_path: String,
    pub baud_rate: u32,
    pub max_in_flight: usize,
    pub dwell: DwellTimes,
    /// `None` disables the ops HTTP server.
    pub http_addr: Option<SocketAddr>,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            topic: TopicPath::default(),
            subscription: SubscriptionPath::default(),
            serial_path: DEFAULT_SERIAL_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            dwell: DwellTimes::default(),
            http_addr: Some(SocketAddr::from(([0, 0, 0, 0], 8080))),
        }
    }
}

impl DispenserConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = DispenserConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let project = non_empty("SODAMIXER_PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        let topic = non_empty("SODAMIXER_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let subscription = non_empty("SODAMIXER_SUBSCRIPTION").unwrap_or_else(|| DEFAULT_SUBSCRIPTION.to_string());
        cfg.topic = TopicPath::new(project.clone(), topic);
        cfg.subscription = SubscriptionPath::new(project, subscription);

        if let Some(v) = non_empty("SODAMIXER_SERIAL_PATH") {
            cfg.serial_path = v;
        }
        if let Some(b) = lookup("SODAMIXER_SERIAL_BAUD").and_then(|v| v.parse::<u32>().ok()) {
            cfg.baud_rate = b;
        }
        if let Some(n) = lookup("SODAMIXER_MAX_IN_FLIGHT").and_then(|v| v.parse::<usize>().ok()) {
            if n > 0 {
                cfg.max_in_flight = n;
            }
        }
        if let Some(s) = lookup("SODAMIXER_CLEAN_DWELL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.dwell.clean = Duration::from_secs(s);
        }
        if let Some(s) = lookup("SODAMIXER_DISPENSE_DWELL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.dwell.dispense = Duration::from_secs(s);
        }
        if let Some(v) = lookup("SODAMIXER_HTTP_ADDR") {
            if v.is_empty() {
                cfg.http_addr = None;
            } else if let Ok(addr) = v.parse::<SocketAddr>() {
                cfg.http_addr = Some(addr);
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> DispenserConfig {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        DispenserConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_match_installed_machine() {
        let cfg = from(&[]);
        assert_eq!(cfg.topic.to_string(), "projects/sodamixer-cc5ba/topics/SodaMixerMessages");
        assert_eq!(cfg.subscription.name(), "SodaMixerMessages_subscriber");
        assert_eq!(cfg.serial_path, "/dev/ttyUSB0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.max_in_flight, 10);
        assert_eq!(cfg.dwell, DwellTimes::default());
    }

    #[test]
    fn overrides_apply() {
        let cfg = from(&[
            ("SODAMIXER_PROJECT", "bar"),
            ("SODAMIXER_SERIAL_PATH", "/dev/ttyACM0"),
            ("SODAMIXER_CLEAN_DWELL_SECS", "3"),
            ("SODAMIXER_MAX_IN_FLIGHT", "1"),
            ("SODAMIXER_HTTP_ADDR", "127.0.0.1:9000"),
        ]);
        assert_eq!(cfg.subscription.to_string(), "projects/bar/subscriptions/SodaMixerMessages_subscriber");
        assert_eq!(cfg.serial_path, "/dev/ttyACM0");
        assert_eq!(cfg.dwell.clean, Duration::from_secs(3));
        assert_eq!(cfg.dwell.dispense, Duration::from_secs(20));
        assert_eq!(cfg.max_in_flight, 1);
        assert_eq!(cfg.http_addr, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let cfg = from(&[("SODAMIXER_SERIAL_BAUD", "fast"), ("SODAMIXER_MAX_IN_FLIGHT", "0"), ("SODAMIXER_HTTP_ADDR", "")]);
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.max_in_flight, 10);
        assert_eq!(cfg.http_addr, None);
    }
}
