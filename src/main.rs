use wmbus2mqtt::{list_drivers, Config, MqttManager, WmbusManager};
use tokio::task::JoinHandle;
use std::time::Duration;
use log::{error, info};


#[tokio::main]
async fn main() {
    let default_filter = std::env::var("W2M_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    info!("Known drivers: {}", list_drivers().join(", "));

    let (mut mqtt, tx) = MqttManager::new(&config.mqtt);

    let mut threads: Vec<JoinHandle<()>> = Vec::new();
    threads.push(tokio::spawn(async move {
        mqtt.start_thread().await;
    }));

    let mut wmbus = match WmbusManager::new(tx, &config) {
        Ok(w) => w,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    threads.push(tokio::spawn(async move {
        wmbus.start_thread().await;
    }));

    info!("All modules started, now waiting for a signal to exit");
    loop {
        tokio::time::sleep(Duration::from_secs(10)).await;
        if threads.iter().any(|t| t.is_finished()) {
            for task in threads.iter_mut() {
                task.abort();
            }
            break;
        }
    }
    error!("A module stopped, exiting");
    std::process::exit(1);
}
