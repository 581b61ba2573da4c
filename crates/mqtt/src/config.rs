use hostname::get as get_hostname;
use std::env;
use std::time::Duration;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    /// Deliveries buffered ahead of the consumer before the event loop stops reading.
    pub max_in_flight: usize,
    /// How long subscription provisioning waits for the broker's SubAck.
    pub suback_timeout: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        let host = "localhost".to_string();
        let port = 1883;
        let client_id = default_client_id();
        let keep_alive_secs = 30;
        Self {
            host,
            port,
            client_id,
            username: None,
            password: None,
            keep_alive_secs,
            clean_session: true,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            suback_timeout: Duration::from_secs(5),
        }
    }
}

impl MqttConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = MqttConfig::default();

        if let Some(v) = lookup("MQTT_BROKER_HOST") {
            if !v.is_empty() {
                cfg.host = v;
            }
        }
        if let Some(v) = lookup("MQTT_BROKER_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                cfg.port = p;
            }
        }
        if let Some(v) = lookup("MQTT_CLIENT_ID") {
            if !v.is_empty() {
                cfg.client_id = v;
            }
        }
        if let Some(v) = lookup("MQTT_USERNAME") {
            if !v.is_empty() {
                cfg.username = Some(v);
            }
        }
        if let Some(v) = lookup("MQTT_PASSWORD") {
            if !v.is_empty() {
                cfg.password = Some(v);
            }
        }
        if let Some(v) = lookup("MQTT_KEEP_ALIVE_SECS") {
            if let Ok(s) = v.parse::<u16>() {
                cfg.keep_alive_secs = s;
            }
        }

        cfg
    }

    /// Binds the session to a subscription so the broker keeps it (and any
    /// unacknowledged orders) across reconnects and restarts.
    pub fn with_persistent_session(mut self, subscription: &str) -> Self {
        self.client_id = format!("sodamixer-{}", subscription);
        self.clean_session = false;
        self
    }
}

fn default_client_id() -> String {
    let host = get_hostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let pid = std::process::id();
    format!("sodamixer-{}-{}", host, pid)
}
