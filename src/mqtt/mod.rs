use std::collections::HashMap;
use lazy_static::lazy_static;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::sync::mpsc::{Receiver, Sender, UnboundedSender};
use serde::{Serialize, Deserialize};
use serde_json;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use uuid::Uuid;

use crate::config::MqttConfig;

pub const TOPIC_PREFIX: &str = "wmbus2mqtt";

/// Decoded state of one meter after a telegram.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeteringData {
    /// Unique per message
    pub id: String,
    pub meter_name: String,
    pub meter_id: String,
    pub driver: String,
    pub transmission_time: DateTime<Utc>,
    pub metered_values: serde_json::Map<String, serde_json::Value>
}

impl MeteringData {
    pub fn new(meter_name: &str, meter_id: &str, driver: &str, metered_values: serde_json::Map<String, serde_json::Value>) -> Self {
        return MeteringData {
            id: Uuid::new_v4().to_string(),
            meter_name: meter_name.to_string(),
            meter_id: meter_id.to_string(),
            driver: driver.to_string(),
            transmission_time: Utc::now(),
            metered_values,
        };
    }

    pub fn topic(&self) -> String {
        return format!("{}/meters/{}/{}", TOPIC_PREFIX, self.meter_name, self.meter_id);
    }

    pub fn analyze_topic(&self) -> String {
        return format!("{}/analyze/{}/{}", TOPIC_PREFIX, self.meter_name, self.meter_id);
    }
}

pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

pub struct SubscribeData {
    /* Relative to wmbus2mqtt/ */
    pub topic: String,
    pub sender: UnboundedSender<String>
}

pub enum Transmission {
    Metering(MeteringData),
    Subscribe(SubscribeData),
    Publish(PublishData)
}

pub struct MqttManager {
    rx: Receiver<Transmission>,
    exit_thread: bool,
    client: AsyncClient,
}

pub struct Callbacks {
    calls: HashMap<String, Vec<UnboundedSender<String>>>,
}

impl Callbacks {
    pub fn new() -> Self {
        return Callbacks { calls: HashMap::new() };
    }

    pub fn insert(&mut self, topic: String, callback: UnboundedSender<String>) {
        debug!("Adding callback for topic {topic}");
        self.calls.entry(topic).or_default().push(callback);
    }

    /// Hands the payload to every subscriber of `topic` without waiting on them.
    pub fn send(&self, topic: &str, payload: String) {
        let calls = match self.calls.get(topic) {
            Some(c) => c,
            None => {
                debug!("Send for unknown topic {topic}");
                return;
            }
        };

        for call in calls {
            if call.send(payload.clone()).is_err() {
                error!("Receiver for {topic} is gone");
            }
        }
    }

    pub fn get_topics(&self) -> Vec<String> {
        return self.calls.keys().cloned().collect();
    }
}

lazy_static! {
    pub static ref CALLBACKS: RwLock<Callbacks> = RwLock::new(Callbacks::new());
}

fn qos_from_u8(qos: u8) -> QoS {
    return match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    };
}

impl MqttManager {
    pub fn new(config: &MqttConfig) -> (Self, Sender<Transmission>) {
        let (mtx, mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection to {}:{} starting up", config.host, config.port);
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        /* Incoming messages go to the registered callbacks */
        let reconnect_c = client.clone();
        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        let payload = String::from_utf8_lossy(&p.payload).to_string();
                        debug!("Received on {}: {payload:?}", p.topic);
                        CALLBACKS.read().await.send(&p.topic, payload);
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected, resubscribing everything");
                        let topics = CALLBACKS.read().await.get_topics();
                        for topic in topics {
                            let client_clone = reconnect_c.clone();
                            tokio::spawn(async move {
                                if let Err(e) = client_clone.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                                    error!("Resubscribing {topic} failed: {e}");
                                }
                            });
                        }
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting ", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return (MqttManager {
            client,
            rx: mrx,
            exit_thread: false,
        }, mtx);
    }

    pub async fn start_thread(&mut self) {
        while !self.exit_thread {
            let option = self.rx.recv().await;

            let transmission = match option {
                Some(t) => t,
                None => {
                    debug!("Reading returned none, we exit now");
                    self.exit_thread = true;
                    continue;
                }
            };

            match transmission {
                Transmission::Metering(data) => {
                    info!("Metering data for {} ({})", data.meter_name, data.id);
                    let payload = match serde_json::to_string(&data.metered_values) {
                        Ok(p) => p,
                        Err(e) => { error!("Unable to serialize {}: {e}", data.meter_name); continue; }
                    };
                    match self.client.publish(data.topic(), QoS::AtLeastOnce, false, payload).await {
                        Err(e) => { error!("Error sending: {}", e); },
                        Ok(_) => { debug!("Send successfully"); }
                    }
                },
                Transmission::Subscribe(subscribe_data) => {
                    let topic = format!("{}/{}", TOPIC_PREFIX, subscribe_data.topic);
                    if self.client.subscribe(topic.clone(), QoS::AtLeastOnce).await.is_ok() {
                        CALLBACKS.write().await.insert(topic.clone(), subscribe_data.sender);
                        info!("Registered Callback {topic}");
                    }
                },
                Transmission::Publish(publish_data) => {
                    match self.client.publish(
                        publish_data.topic,
                        qos_from_u8(publish_data.qos),
                        publish_data.retain,
                        publish_data.payload
                    ).await {
                        Err(e) => { error!("Error publishing: {}", e); },
                        Ok(_) => { debug!("Published successfully"); }
                    }
                },
            };
        }

        info!("MQTT thread exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_callbacks_fan_out() {
        let mut callbacks = Callbacks::new();
        let (s1, mut r1) = tokio::sync::mpsc::unbounded_channel();
        let (s2, mut r2) = tokio::sync::mpsc::unbounded_channel();
        callbacks.insert("wmbus2mqtt/telegrams".to_string(), s1);
        callbacks.insert("wmbus2mqtt/telegrams".to_string(), s2);

        callbacks.send("wmbus2mqtt/telegrams", "hello".to_string());
        callbacks.send("wmbus2mqtt/other", "ignored".to_string());

        assert_eq!(r1.recv().await.unwrap(), "hello");
        assert_eq!(r2.recv().await.unwrap(), "hello");
        assert!(r1.try_recv().is_err());
        assert_eq!(callbacks.get_topics(), vec!["wmbus2mqtt/telegrams".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_registration() {
        let topic = "wmbus2mqtt/slow_subscriber";
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        CALLBACKS.write().await.insert(topic.to_string(), sender);

        /* Nobody reads while the event loop delivers */
        for i in 0..50 {
            CALLBACKS.read().await.send(topic, format!("telegram {i}"));
        }

        let lock = tokio::time::timeout(Duration::from_secs(2), CALLBACKS.write()).await;
        assert!(lock.is_ok());
        drop(lock);

        for i in 0..50 {
            assert_eq!(receiver.recv().await.unwrap(), format!("telegram {i}"));
        }
    }

    #[test]
    fn test_metering_data() {
        let mut values = serde_json::Map::new();
        values.insert("total_volume_m3".to_string(), serde_json::Value::from(1.5f64));
        let a = MeteringData::new("water", "76348799", "multical21", values.clone());
        let b = MeteringData::new("water", "76348799", "multical21", values);
        assert_ne!(a.id, b.id);
        assert_eq!(a.topic(), "wmbus2mqtt/meters/water/76348799");
        assert_eq!(a.analyze_topic(), "wmbus2mqtt/analyze/water/76348799");

        let doc = serde_json::to_value(&a).unwrap();
        assert_eq!(doc["metered_values"]["total_volume_m3"], 1.5);
        assert_eq!(doc["driver"], "multical21");
    }

    #[test]
    fn test_qos() {
        assert_eq!(qos_from_u8(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(7), QoS::AtMostOnce);
    }
}
