//! Wireless M-Bus to MQTT bridge
//!
//! Splits wM-Bus application layer payloads into data records, decodes them
//! with per meter type drivers and publishes the results to MQTT.

pub mod units;
pub mod models;
pub mod wmbus;
pub mod drivers;
pub mod shell;
pub mod config;
pub mod mqtt;

// Re-export common types for easier access
pub use config::Config;
pub use drivers::{create_meter, list_drivers, Meter};
pub use mqtt::{MqttManager, MeteringData, CALLBACKS};
pub use wmbus::WmbusManager;
