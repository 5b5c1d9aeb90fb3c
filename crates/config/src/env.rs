//! Environment-variable overrides (§6: "env-var overrides use UPPER_SNAKE
//! form of the dotted key"), e.g. `scheduler.lookupIntervalMilliseconds` is
//! overridden by `SCHEDULER_LOOKUPINTERVALMILLISECONDS`.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DbDriver, SteepConfig};

fn env_key(dotted: &str) -> String {
    dotted.replace('.', "_").to_ascii_uppercase()
}

fn read(dotted: &str) -> Option<String> {
    std::env::var(env_key(dotted)).ok()
}

fn parse<T: std::str::FromStr>(dotted: &str, value: String) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: dotted.to_string(),
        message: format!("cannot parse {value:?}"),
    })
}

pub fn apply(config: &mut SteepConfig) -> ConfigResult<()> {
    if let Some(v) = read("tmpPath") {
        config.tmp_path = PathBuf::from(v);
    }
    if let Some(v) = read("outPath") {
        config.out_path = PathBuf::from(v);
    }
    if let Some(v) = read("scheduler.lookupIntervalMilliseconds") {
        config.scheduler.lookup_interval_milliseconds =
            parse("scheduler.lookupIntervalMilliseconds", v)?;
    }
    if let Some(v) = read("controller.lookupIntervalMilliseconds") {
        config.controller.lookup_interval_milliseconds =
            parse("controller.lookupIntervalMilliseconds", v)?;
    }
    if let Some(v) = read("controller.lookupOrphansIntervalMilliseconds") {
        config.controller.lookup_orphans_interval_milliseconds =
            parse("controller.lookupOrphansIntervalMilliseconds", v)?;
    }
    if let Some(v) = read("agent.enabled") {
        config.agent.enabled = parse("agent.enabled", v)?;
    }
    if let Some(v) = read("agent.id") {
        config.agent.id = Some(v);
    }
    if let Some(v) = read("agent.capabilities") {
        config.agent.capabilities = v.split(',').map(str::trim).map(str::to_string).collect();
    }
    if let Some(v) = read("agent.busyTimeout") {
        config.agent.busy_timeout = parse("agent.busyTimeout", v)?;
    }
    if let Some(v) = read("agent.outputLinesToCollect") {
        config.agent.output_lines_to_collect = parse("agent.outputLinesToCollect", v)?;
    }
    if let Some(v) = read("db.driver") {
        config.db.driver = match v.to_ascii_lowercase().as_str() {
            "inmemory" => DbDriver::Inmemory,
            "postgresql" => DbDriver::Postgresql,
            "mongodb" => DbDriver::Mongodb,
            other => {
                return Err(ConfigError::Invalid {
                    key: "db.driver".to_string(),
                    message: format!("unknown driver {other:?}"),
                })
            }
        };
    }
    if let Some(v) = read("db.url") {
        config.db.url = Some(v);
    }
    if let Some(v) = read("db.username") {
        config.db.username = Some(v);
    }
    if let Some(v) = read("db.password") {
        config.db.password = Some(v);
    }
    Ok(())
}
