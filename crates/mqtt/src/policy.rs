//! Classification of event-loop failures.
//!
//! Brokers drop connections now and then (restarts, NAT timeouts, flaky
//! uplinks). Those are [`ErrorClass::Unavailable`]: the loop logs, backs off
//! and reconnects. Anything else means the session cannot work as configured
//! (credentials, protocol errors) and is [`ErrorClass::Fatal`].

use rumqttc::{ConnectReturnCode, ConnectionError, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unavailable,
    Fatal,
}

pub fn classify(err: &ConnectionError) -> ErrorClass {
    match err {
        ConnectionError::Io(_)
        | ConnectionError::NetworkTimeout
        | ConnectionError::FlushTimeout
        | ConnectionError::ConnectionRefused(ConnectReturnCode::ServiceUnavailable)
        | ConnectionError::MqttState(StateError::Io(_))
        | ConnectionError::MqttState(StateError::AwaitPingResp) => ErrorClass::Unavailable,
        _ => ErrorClass::Fatal,
    }
}
