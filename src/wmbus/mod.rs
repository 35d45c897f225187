use std::collections::HashMap;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use crate::config::{Config, ConfigError, MeterConfig};
use crate::drivers::{create_meter, DriverError, Meter};
use crate::models::MeterInfo;
use crate::mqtt::{MeteringData, PublishData, SubscribeData, Transmission};
use crate::shell::{build_meter_env, run_hook, ShellError};

pub mod structs;
pub mod dv_parser;
pub mod resolver;
pub mod value_decoder;

use structs::Telegram;

/// A telegram that could not be split into records completely.
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Record at {offset:#x} declares {declared} bytes but only {available} are left")]
    Malformed {
        offset: usize,
        declared: usize,
        available: usize,
        /// Records before the broken one
        partial: Telegram,
    },
}

impl TelegramError {
    pub fn into_partial(self) -> Telegram {
        return match self {
            TelegramError::Malformed { partial, .. } => partial,
        };
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum MalformedRecord {
    #[error("Record at {offset:#x} has {actual} payload bytes, its encoding needs {expected}")]
    LengthMismatch { offset: usize, expected: usize, actual: usize },
    #[error("Invalid packed decimal digit at {offset:#x}")]
    InvalidDigit { offset: usize },
    #[error("Record at {offset:#x} does not carry a number")]
    NotNumeric { offset: usize },
    #[error("Record at {offset:#x} has an unsupported integer width of {width} bytes")]
    UnsupportedWidth { offset: usize, width: usize },
}

#[derive(Error, Debug)]
pub enum WmbusError {
    #[error("Message is not a telegram document: {0}")]
    InvalidMessage(#[from] serde_json::Error),
    #[error("Telegram is not hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("No meter configured for id {0}")]
    MeterNotConfigured(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What arrives on the input topic. `telegram` is the application layer
/// payload as hex, link layer and decryption are handled by the receiver.
#[derive(Deserialize, Debug)]
pub struct TelegramMessage {
    pub id: String,
    pub telegram: String,
}

/// Result of one telegram, ready to be published and handed to the hooks.
pub struct Decoded {
    pub data: MeteringData,
    /// Record dump with the driver's explanations
    pub analysis: String,
    pub hooks: Vec<String>,
    pub envs: Vec<String>,
}

struct ConfiguredMeter {
    config: MeterConfig,
    pattern: Regex,
}

pub struct WmbusManager {
    sender: Sender<Transmission>,
    input_topic: String,
    meters: Vec<ConfiguredMeter>,
    global_shell: Vec<String>,
    /* One driver per physical meter id */
    drivers: HashMap<String, Box<dyn Meter>>,
}

impl WmbusManager {
    pub fn new(sender: Sender<Transmission>, config: &Config) -> Result<Self, WmbusError> {
        let mut meters = Vec::new();
        for m in config.meters.iter() {
            meters.push(ConfiguredMeter { config: m.clone(), pattern: m.id_regex()? });
        }

        return Ok(WmbusManager {
            sender,
            input_topic: config.mqtt.input_topic.clone(),
            meters,
            global_shell: config.shell.clone(),
            drivers: HashMap::new(),
        });
    }

    /// Decodes one input message with the driver of its meter.
    pub fn handle_message(&mut self, message: &str) -> Result<Decoded, WmbusError> {
        let msg: TelegramMessage = serde_json::from_str(message)?;
        let bytes = hex::decode(msg.telegram.trim())?;

        let configured = match self.meters.iter().find(|m| m.pattern.is_match(&msg.id)) {
            Some(m) => &m.config,
            None => { return Err(WmbusError::MeterNotConfigured(msg.id)); }
        };
        let mut hooks = configured.shell.clone();
        hooks.extend(self.global_shell.iter().cloned());

        let mut telegram = match dv_parser::parse(&bytes) {
            Ok(t) => t,
            Err(e) => {
                warn!("{}: {e}, using the records before it", msg.id);
                e.into_partial()
            }
        };

        if !self.drivers.contains_key(&msg.id) {
            info!("New meter {} ({}) using driver {}", configured.name, msg.id, configured.driver);
            let meter = create_meter(MeterInfo::new(&configured.name, &msg.id, &configured.driver))?;
            self.drivers.insert(msg.id.clone(), meter);
        }
        let meter = match self.drivers.get_mut(&msg.id) {
            Some(m) => m,
            None => { return Err(WmbusError::MeterNotConfigured(msg.id)); }
        };

        meter.decode_telegram(&mut telegram);
        let analysis = telegram.analyze();
        debug!("Telegram of {}:\n{analysis}", msg.id);
        debug!("{}", meter.common().render_brief());

        let info = meter.info();
        let data = MeteringData::new(&info.name, &info.id, &info.driver, meter.render_json());
        let envs = build_meter_env(meter.as_ref());

        return Ok(Decoded { data, analysis, hooks, envs });
    }

    pub async fn start_thread(&mut self) {
        info!("Starting wM-Bus thread with {} meters", self.meters.len());
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

        let register = Transmission::Subscribe(SubscribeData {
            topic: self.input_topic.clone(),
            sender,
        });
        let _ = self.sender.send(register).await;

        /* Strictly one telegram after the other */
        while let Some(message) = receiver.recv().await {
            let decoded = match self.handle_message(&message) {
                Ok(d) => d,
                Err(e) => {
                    error!("Telegram dropped: {e}");
                    continue;
                }
            };

            let Decoded { data, analysis, hooks, envs } = decoded;
            let dump = Transmission::Publish(PublishData {
                topic: data.analyze_topic(),
                payload: analysis,
                qos: 0,
                retain: false,
            });
            let _ = self.sender.send(dump).await;
            let _ = self.sender.send(Transmission::Metering(data)).await;

            if hooks.is_empty() {
                continue;
            }
            let res = tokio::task::spawn_blocking(move || -> Result<(), ShellError> {
                for hook in hooks.iter() {
                    run_hook(hook, &envs)?;
                }
                return Ok(());
            }).await;

            match res {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    error!("Hook failed, stopping: {e}");
                    return;
                }
                Err(e) => {
                    error!("Hook task failed, stopping: {e}");
                    return;
                }
            }
        }
        info!("wM-Bus thread exit");
    }
}
