//! # Steep Config
//!
//! Loads the flat-key configuration document (§6): a TOML file, overlaid
//! with `UPPER_SNAKE`-of-dotted-key environment variable overrides.

mod env;
mod error;
mod model;

use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use model::{AgentConfig, ControllerConfig, DbConfig, DbDriver, SchedulerConfig, SteepConfig};

/// Load configuration: defaults, overlaid with `path` (if given), overlaid
/// with environment variables, then validated.
pub fn load(path: Option<&Path>) -> ConfigResult<SteepConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        }
        None => SteepConfig::default(),
    };

    env::apply(&mut config)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &SteepConfig) -> ConfigResult<()> {
    if config.agent.enabled && config.agent.capabilities.is_empty() {
        tracing::warn!("agent.enabled is true but agent.capabilities is empty");
    }
    if matches!(
        config.db.driver,
        DbDriver::Postgresql | DbDriver::Mongodb
    ) && config.db.url.is_none()
    {
        return Err(ConfigError::Invalid {
            key: "db.url".to_string(),
            message: "required when db.driver is not inmemory".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        assert!(load(None).is_ok());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("steep-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("steep.toml");
        std::fs::write(&path, "tmpPath = \"/custom/tmp\"\n[scheduler]\nlookupIntervalMilliseconds = 5000\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.tmp_path, std::path::PathBuf::from("/custom/tmp"));
        assert_eq!(config.scheduler.lookup_interval_milliseconds, 5000);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn remote_driver_without_url_is_rejected() {
        let mut config = SteepConfig::default();
        config.db.driver = DbDriver::Postgresql;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
