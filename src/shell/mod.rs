use log::{debug, warn};
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::drivers::Meter;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Unable to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Environment entry {0} is not KEY=VALUE")]
    InvalidEnv(String),
}

/// Runs `program` with exactly the given environment and waits for it.
///
/// Every entry of `envs` is a `KEY=VALUE` string. Stdin is closed. A non zero
/// exit status is logged but not treated as an error, failing to start the
/// program is.
pub fn invoke_shell(program: &str, args: &[String], envs: &[String]) -> Result<(), ShellError> {
    let mut cmd = Command::new(program);
    cmd.args(args).env_clear().stdin(Stdio::null());

    for e in envs.iter() {
        match e.split_once('=') {
            Some((key, value)) if !key.is_empty() => { cmd.env(key, value); }
            _ => { return Err(ShellError::InvalidEnv(e.clone())); }
        }
    }

    debug!("Invoking {program} {}", args.join(" "));
    let status = cmd.status().map_err(|source| ShellError::Spawn { program: program.to_string(), source })?;

    if !status.success() {
        warn!("{program} {} returned {status}", args.join(" "));
    }
    return Ok(());
}

/// Environment handed to the hooks of a meter after each telegram.
pub fn build_meter_env(meter: &dyn Meter) -> Vec<String> {
    let info = meter.info();
    let doc = meter.render_json();
    let common = meter.common();

    let mut envs = vec![
        format!("METER_JSON={}", serde_json::Value::Object(doc)),
        format!("METER_ID={}", info.id),
        format!("METER_NAME={}", info.name),
        format!("METER_TYPE={}", info.driver),
        format!("METER_MEDIA={}", common.media()),
    ];
    if let Some(ts) = common.updated() {
        envs.push(format!("METER_TIMESTAMP={}", ts.to_rfc3339()));
    }
    for p in meter.prints().iter().filter(|p| p.properties.json) {
        envs.push(format!("METER_{}_{}={}",
                          p.name.to_uppercase(),
                          p.unit.suffix().to_uppercase(),
                          common.field(p.field)));
    }
    return envs;
}

/// Runs one hook through `/bin/sh -c` for the given meter.
pub fn run_hook(command: &str, envs: &[String]) -> Result<(), ShellError> {
    return invoke_shell("/bin/sh", &["-c".to_string(), command.to_string()], envs);
}
