use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::drivers::list_drivers;

const CONFIG_PATHS: [&str; 2] = ["config/wmbus2mqtt.yaml", "wmbus2mqtt.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to find a config, tried {0}")]
    NotFound(String),
    #[error("Unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse config: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Meter {meter}: invalid id pattern {pattern}")]
    InvalidId { meter: String, pattern: String },
    #[error("Meter {meter}: unknown driver {driver}")]
    UnknownDriver { meter: String, driver: String },
}

fn mqtt_port_default() -> u16 { return 1883 }
fn mqtt_user_default() -> String { return "".to_string() }
fn mqtt_client_name_default() -> String { return "wmbus2mqtt".to_string() }
fn mqtt_input_topic_default() -> String { return "telegrams".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default="mqtt_user_default")]
    pub user: String,
    #[serde(default="mqtt_user_default")]
    pub pass: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    /* Below wmbus2mqtt/ */
    #[serde(default="mqtt_input_topic_default")]
    pub input_topic: String,
}

fn shell_default() -> Vec<String> { return Vec::new() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MeterConfig {
    pub name: String,
    /* Meter id, a * matches any run of characters */
    pub id: String,
    pub driver: String,
    #[serde(default="shell_default")]
    pub shell: Vec<String>,
}

impl MeterConfig {
    pub fn id_regex(&self) -> Result<Regex, ConfigError> {
        let parts: Vec<String> = self.id.split('*').map(regex::escape).collect();
        let pattern = format!("^{}$", parts.join(".*"));
        return Regex::new(&pattern).map_err(|_| ConfigError::InvalidId {
            meter: self.name.clone(),
            pattern: self.id.clone(),
        });
    }
}

fn meters_default() -> Vec<MeterConfig> { return Vec::new() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default="meters_default")]
    pub meters: Vec<MeterConfig>,
    /* Run after every telegram of any meter */
    #[serde(default="shell_default")]
    pub shell: Vec<String>,
}

impl Config {
    /// Loads the config from `W2M_CONFIG` or the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("W2M_CONFIG") {
            return Config::load_from(Path::new(&path));
        }

        for candidate in CONFIG_PATHS.iter() {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Config::load_from(&path);
            }
            debug!("No config at {candidate}");
        }
        return Err(ConfigError::NotFound(CONFIG_PATHS.join(", ")));
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Config::from_str(&contents)?;
        info!("Loaded config from {} with {} meters", path.display(), config.meters.len());
        return Ok(config);
    }

    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yml::from_str(contents)?;
        config.validate()?;
        return Ok(config);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let drivers = list_drivers();
        for m in self.meters.iter() {
            m.id_regex()?;
            if !drivers.contains(&m.driver.as_str()) {
                return Err(ConfigError::UnknownDriver { meter: m.name.clone(), driver: m.driver.clone() });
            }
        }
        return Ok(());
    }
}
