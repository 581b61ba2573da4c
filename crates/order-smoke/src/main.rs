// Publishes one order the way the ordering front-end does, then waits for the broker's PUBACK.
//
//   sodamixer-order-smoke mix sprite apple tea

use rumqttc::QoS;
use sodamixer_core::{encode_order, Intent, OrderMessage, TopicPath, DEFAULT_PROJECT, DEFAULT_TOPIC};
use sodamixer_mqtt::{MqttConfig, MqttEvent, MqttService};
use tokio::time::{sleep, timeout, Duration};

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let intent = Intent::from(args.next().unwrap_or_else(|| "mix".to_string()));
    let ingredients: Vec<String> = args.collect();
    let order = OrderMessage::new(intent, ingredients);

    let project = std::env::var("SODAMIXER_PROJECT").unwrap_or_else(|_| DEFAULT_PROJECT.to_string());
    let topic_name = std::env::var("SODAMIXER_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string());
    let topic = TopicPath::new(project, topic_name).to_string();

    let payload = match encode_order(&order) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to encode order: {}", e);
            std::process::exit(1);
        }
    };

    let cfg = MqttConfig::from_env();
    eprintln!("Connecting to {}:{}", cfg.host, cfg.port);
    let (mqtt, _deliveries) = match MqttService::connect(cfg).await {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("MQTT init failed: {}", e);
            std::process::exit(2);
        }
    };
    let mut events = mqtt.events();

    let connected = timeout(Duration::from_secs(5), async {
        while !mqtt.is_ready() {
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if connected.is_err() {
        eprintln!("Timeout waiting for broker connection");
        std::process::exit(3);
    }

    if let Err(e) = mqtt.publish(&topic, QoS::AtLeastOnce, false, payload).await {
        eprintln!("Publish failed: {}", e);
        std::process::exit(4);
    }

    // Wait up to 5s for the broker to accept the order
    let acked = timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(MqttEvent::PubAck(_)) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await;

    match acked {
        Ok(true) => println!("Published {:?} to {}", order, topic),
        _ => {
            eprintln!("Timeout waiting for PUBACK");
            std::process::exit(5);
        }
    }
    let _ = mqtt.disconnect().await;
}
