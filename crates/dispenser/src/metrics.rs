use std::sync::Arc;

use prometheus::{IntCounter, IntGauge};

pub struct Metrics {
    pub broker_connected: IntGauge,
    pub orders_received: IntCounter,
    pub orders_dispensed: IntCounter,
    pub orders_malformed: IntCounter,
    pub serial_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        let broker_connected = IntGauge::new("sodamixer_broker_connected", "Broker connection status (1 connected, 0 otherwise)").unwrap();
        let orders_received = IntCounter::new("sodamixer_orders_received_total", "Total order messages received").unwrap();
        let orders_dispensed = IntCounter::new("sodamixer_orders_dispensed_total", "Orders that completed a dispense or clean cycle").unwrap();
        let orders_malformed = IntCounter::new("sodamixer_orders_malformed_total", "Acknowledged orders dropped because the payload could not be decoded").unwrap();
        let serial_errors = IntCounter::new("sodamixer_serial_errors_total", "Orders aborted by a serial write failure").unwrap();

        let registry = prometheus::default_registry();
        let _ = registry.register(Box::new(broker_connected.clone()));
        let _ = registry.register(Box::new(orders_received.clone()));
        let _ = registry.register(Box::new(orders_dispensed.clone()));
        let _ = registry.register(Box::new(orders_malformed.clone()));
        let _ = registry.register(Box::new(serial_errors.clone()));

        Arc::new(Self { broker_connected, orders_received, orders_dispensed, orders_malformed, serial_errors })
    }
}
