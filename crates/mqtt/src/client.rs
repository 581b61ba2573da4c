use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;
use std::collections::HashMap;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, Incoming, MqttOptions, Outgoing, Publish, QoS, SubAck, SubscribeReasonCode};
use sodamixer_core::{SubscriptionPath, TopicPath};
use tokio::sync::{broadcast, mpsc, RwLock, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::MqttConfig;
use crate::delivery::{AckHandle, Acker, Delivery};
use crate::error::{MqttError, ProvisionError};
use crate::policy::{classify, ErrorClass};
use crate::subscription::SubscriptionAdmin;

#[derive(Debug, Clone)]
pub enum MqttEvent {
    Connected { session_present: bool },
    Disconnected,
    PubAck(u16),
    SubAck { pkid: u16, granted: bool },
    /// The event loop has stopped; no further deliveries will arrive.
    Fatal(String),
}

#[derive(Clone)]
pub struct MqttService {
    client: Arc<Mutex<AsyncClient>>,
    ready: Arc<AtomicBool>,
    events_tx: broadcast::Sender<MqttEvent>,
    subscriptions: Arc<RwLock<HashMap<String, QoS>>>,
    suback_timeout: Duration,
    // Shared so clones can outlive the caller; the task runs until it returns on its own
    _loop_handle: Arc<JoinHandle<()>>,
}

impl MqttService {
    /// Starts the event loop. At most `config.max_in_flight` deliveries are
    /// released to the consumer at once: the returned channel holds one fewer,
    /// the remaining slot being the delivery the consumer is working on.
    /// Anything beyond that stays staged, unacknowledged, inside the service.
    pub async fn connect(config: MqttConfig) -> Result<(Self, mpsc::Receiver<Delivery>), MqttError> {
        let (client, eventloop) = build_client(&config)?;
        let ready = Arc::new(AtomicBool::new(false));
        let (tx, _) = broadcast::channel(256);
        let (staged_tx, staged_rx) = mpsc::unbounded_channel();
        let (deliveries_tx, deliveries_rx) = mpsc::channel(handoff_capacity(config.max_in_flight));
        let subscriptions = Arc::new(RwLock::new(HashMap::new()));
        let suback_timeout = config.suback_timeout;
        let ready_clone = ready.clone();
        let tx_clone = tx.clone();
        let subscriptions_clone = subscriptions.clone();

        tokio::spawn(forward_deliveries(staged_rx, deliveries_tx));

        let client_shared = Arc::new(Mutex::new(client));
        let client_clone = client_shared.clone();
        let loop_handle = tokio::spawn(async move {
            run_eventloop(eventloop, client_clone, ready_clone, tx_clone, staged_tx, subscriptions_clone, config).await;
        });

        let service = Self {
            client: client_shared,
            ready,
            events_tx: tx,
            subscriptions,
            suback_timeout,
            _loop_handle: Arc::new(loop_handle),
        };
        Ok((service, deliveries_rx))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> broadcast::Receiver<MqttEvent> {
        self.events_tx.subscribe()
    }

    pub async fn publish<T: Into<Vec<u8>>>(&self, topic: &str, qos: QoS, retain: bool, payload: T) -> Result<(), MqttError> {
        let client = self.client.lock().await;
        client.publish(topic, qos, retain, payload).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.ready.store(false, Ordering::Relaxed);
        let client = self.client.lock().await;
        client.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionAdmin for MqttService {
    /// Queues the SUBSCRIBE and waits up to `suback_timeout` for the broker's
    /// verdict. Without a verdict (broker still unreachable) the subscription
    /// stays tracked and is confirmed on connect; a later refusal is fatal in
    /// the event loop.
    async fn create_subscription(&self, subscription: &SubscriptionPath, topic: &TopicPath) -> Result<(), ProvisionError> {
        let filter = topic.to_string();
        {
            let mut subs = self.subscriptions.write().await;
            if subs.contains_key(&filter) {
                return Err(ProvisionError::AlreadyExists(subscription.to_string()));
            }
            // Tracked so the event loop can restore it after a reconnect
            subs.insert(filter.clone(), QoS::AtLeastOnce);
        }

        let mut events = self.events_tx.subscribe();
        let queued = {
            let client = self.client.lock().await;
            client.subscribe(filter.as_str(), QoS::AtLeastOnce).await
        };
        if let Err(err) = queued {
            self.subscriptions.write().await.remove(&filter);
            return Err(err.into());
        }

        match timeout(self.suback_timeout, await_suback(&mut events)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => {
                self.subscriptions.write().await.remove(&filter);
                Err(ProvisionError::Rejected {
                    subscription: subscription.to_string(),
                    reason: "broker returned SubAck failure".to_string(),
                })
            }
            Ok(Err(err)) => {
                self.subscriptions.write().await.remove(&filter);
                Err(err.into())
            }
            Err(_) => {
                warn!(%subscription, "No SubAck yet; subscription will be confirmed once the broker is reachable");
                Ok(())
            }
        }
    }
}

async fn await_suback(events: &mut broadcast::Receiver<MqttEvent>) -> Result<bool, MqttError> {
    loop {
        match events.recv().await {
            Ok(MqttEvent::SubAck { granted, .. }) => return Ok(granted),
            Ok(MqttEvent::Fatal(reason)) => return Err(MqttError::Fatal(reason)),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                return Err(MqttError::Fatal("event stream closed".to_string()))
            }
        }
    }
}

fn suback_granted(ack: &SubAck) -> bool {
    !ack.return_codes.iter().any(|c| matches!(c, SubscribeReasonCode::Failure))
}

fn handoff_capacity(max_in_flight: usize) -> usize {
    max_in_flight.saturating_sub(1).max(1)
}

/// Moves staged deliveries to the consumer, waiting on it when it is saturated.
/// Runs apart from the event loop so keep-alives and PUBACKs keep flowing.
async fn forward_deliveries(mut staged: mpsc::UnboundedReceiver<Delivery>, deliveries_tx: mpsc::Sender<Delivery>) {
    while let Some(delivery) = staged.recv().await {
        if deliveries_tx.send(delivery).await.is_err() {
            info!("Delivery receiver dropped; no longer forwarding orders");
            return;
        }
    }
}

struct PublishAck {
    client: Arc<Mutex<AsyncClient>>,
    publish: Publish,
}

#[async_trait]
impl AckHandle for PublishAck {
    async fn ack(self: Box<Self>) -> Result<(), MqttError> {
        let client = self.client.lock().await;
        client.ack(&self.publish).await?;
        Ok(())
    }
}

fn build_client(config: &MqttConfig) -> Result<(AsyncClient, EventLoop), ClientError> {
    let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs as u64));
    opts.set_clean_session(config.clean_session);
    // Orders are settled by the dispenser, not on receipt
    opts.set_manual_acks(true);
    if let (Some(u), Some(p)) = (&config.username, &config.password) {
        opts.set_credentials(u.clone(), p.clone());
    }
    opts.set_request_channel_capacity(64);
    Ok(AsyncClient::new(opts, 64))
}

async fn run_eventloop(
    mut eventloop: EventLoop,
    client_shared: Arc<Mutex<AsyncClient>>,
    ready: Arc<AtomicBool>,
    events_tx: broadcast::Sender<MqttEvent>,
    staged_tx: mpsc::UnboundedSender<Delivery>,
    subscriptions: Arc<RwLock<HashMap<String, QoS>>>,
    config: MqttConfig,
) {
    let mut backoff_secs = 1u64;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                info!(session_present = ack.session_present, "MQTT connected");
                ready.store(true, Ordering::Relaxed);
                let _ = events_tx.send(MqttEvent::Connected { session_present: ack.session_present });

                // Restore all tracked subscriptions after reconnection
                let subs = subscriptions.read().await;
                let client = client_shared.lock().await;
                for (topic, qos) in subs.iter() {
                    debug!("Restoring subscription to {}", topic);
                    if let Err(err) = client.subscribe(topic, *qos).await {
                        warn!(?err, "Failed to restore subscription to {}", topic);
                    }
                }
                drop(client);
                drop(subs);

                backoff_secs = 1;
            }
            Ok(Event::Incoming(Incoming::Publish(p))) => {
                let acker = Acker::new(PublishAck { client: client_shared.clone(), publish: p.clone() });
                let delivery = Delivery::new(p.topic.to_string(), p.payload.to_vec(), acker);
                if staged_tx.send(delivery).is_err() {
                    info!("Delivery forwarder stopped; stopping MQTT event loop");
                    ready.store(false, Ordering::Relaxed);
                    return;
                }
            }
            Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                let granted = suback_granted(&ack);
                let _ = events_tx.send(MqttEvent::SubAck { pkid: ack.pkid, granted });
                if !granted {
                    error!(pkid = ack.pkid, "Broker refused subscription; giving up");
                    ready.store(false, Ordering::Relaxed);
                    let _ = events_tx.send(MqttEvent::Fatal("broker refused subscription".to_string()));
                    return;
                }
            }
            Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                let _ = events_tx.send(MqttEvent::PubAck(ack.pkid));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                warn!("MQTT disconnect requested");
                ready.store(false, Ordering::Relaxed);
                let _ = events_tx.send(MqttEvent::Disconnected);
            }
            Ok(other) => {
                debug!(?other, "MQTT event");
            }
            Err(e) if classify(&e) == ErrorClass::Fatal => {
                error!(error = %e, "MQTT connection failed; giving up");
                ready.store(false, Ordering::Relaxed);
                let _ = events_tx.send(MqttEvent::Fatal(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(error = %e, "MQTT broker unavailable; continuing to listen");
                ready.store(false, Ordering::Relaxed);
                let _ = events_tx.send(MqttEvent::Disconnected);

                // Exponential backoff with cap
                let wait = backoff_secs.min(30);
                sleep(Duration::from_secs(wait)).await;
                backoff_secs = (backoff_secs * 2).min(60);

                match build_client(&config) {
                    Ok((new_client, new_eventloop)) => {
                        eventloop = new_eventloop;
                        {
                            let mut client_guard = client_shared.lock().await;
                            *client_guard = new_client;
                        }
                        info!("MQTT client and eventloop rebuilt, attempting reconnection");
                        continue;
                    }
                    Err(err) => {
                        error!(?err, "Failed to rebuild MQTT client; retrying");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{ensure_subscription, SubscriptionStatus};

    struct NoopAck;

    #[async_trait]
    impl AckHandle for NoopAck {
        async fn ack(self: Box<Self>) -> Result<(), MqttError> {
            Ok(())
        }
    }

    fn delivery(n: u8) -> Delivery {
        Delivery::new("projects/p/topics/t", vec![n], Acker::new(NoopAck))
    }

    fn offline_config() -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".to_string(),
            // Nothing listens on port 1, so the loop stays in its unavailable branch
            port: 1,
            suback_timeout: Duration::from_millis(50),
            ..MqttConfig::default()
        }
    }

    #[test]
    fn handoff_leaves_one_slot_for_the_order_in_progress() {
        assert_eq!(handoff_capacity(10), 9);
        assert_eq!(handoff_capacity(2), 1);
        assert_eq!(handoff_capacity(1), 1);
        assert_eq!(handoff_capacity(0), 1);
    }

    #[test]
    fn suback_failure_is_not_granted() {
        let ok = SubAck { pkid: 1, return_codes: vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)] };
        let refused = SubAck { pkid: 2, return_codes: vec![SubscribeReasonCode::Failure] };
        assert!(suback_granted(&ok));
        assert!(!suback_granted(&refused));
    }

    #[tokio::test]
    async fn suback_wait_sees_refusal_and_fatal_events() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(MqttEvent::Disconnected).unwrap();
        tx.send(MqttEvent::SubAck { pkid: 3, granted: false }).unwrap();
        assert!(!await_suback(&mut rx).await.unwrap());

        tx.send(MqttEvent::Fatal("not authorized".into())).unwrap();
        let err = await_suback(&mut rx).await.unwrap_err();
        assert!(matches!(err, MqttError::Fatal(reason) if reason == "not authorized"));

        drop(tx);
        assert!(matches!(await_suback(&mut rx).await, Err(MqttError::Fatal(_))));
    }

    #[tokio::test]
    async fn forwarder_never_blocks_the_staging_side() {
        let (staged_tx, staged_rx) = mpsc::unbounded_channel();
        let (deliveries_tx, mut deliveries_rx) = mpsc::channel(handoff_capacity(2));
        let forwarder = tokio::spawn(forward_deliveries(staged_rx, deliveries_tx));

        // The event loop side hands over more than the consumer can hold without waiting
        for n in 0..5 {
            staged_tx.send(delivery(n)).unwrap();
        }
        drop(staged_tx);

        let mut received = Vec::new();
        while let Some(d) = deliveries_rx.recv().await {
            received.push(d.payload[0]);
        }
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        forwarder.await.unwrap();
    }

    #[tokio::test]
    async fn forwarder_stops_when_consumer_is_gone() {
        let (staged_tx, staged_rx) = mpsc::unbounded_channel();
        let (deliveries_tx, deliveries_rx) = mpsc::channel(1);
        drop(deliveries_rx);
        let forwarder = tokio::spawn(forward_deliveries(staged_rx, deliveries_tx));

        staged_tx.send(delivery(0)).unwrap();
        forwarder.await.unwrap();
        assert!(staged_tx.send(delivery(1)).is_err());
    }

    #[tokio::test]
    async fn subscription_is_created_once_while_broker_is_offline() {
        let (service, _deliveries) = MqttService::connect(offline_config()).await.unwrap();
        let sub = SubscriptionPath::default();
        let topic = TopicPath::default();

        let first = ensure_subscription(&service, &sub, &topic).await.unwrap();
        let second = ensure_subscription(&service, &sub, &topic).await.unwrap();

        assert_eq!(first, SubscriptionStatus::Created);
        assert_eq!(second, SubscriptionStatus::Existing);
        let tracked = service.subscriptions.read().await;
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains_key("projects/sodamixer-cc5ba/topics/SodaMixerMessages"));
        assert!(!service.is_ready());
    }
}
