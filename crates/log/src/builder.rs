use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Builds and installs the process-wide `tracing` subscriber.
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the logger installed for the process lifetime. Dropping it does
/// not tear anything down today — it exists so callers hold a named guard
/// at the top of `main`, the same shape as the teacher's file-writer guard,
/// ready for non-blocking writers later.
#[derive(Debug)]
pub struct LoggerGuard {
    _private: (),
}

impl LoggerBuilder {
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the subscriber as the global default.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Filter`] if `config.level` is not a valid
    /// `EnvFilter` directive string.
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level).map_err(|source| LogError::Filter {
            directive: self.config.level.clone(),
            source,
        })?;

        let registry = Registry::default().with(filter);
        match self.config.format {
            Format::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init(),
            Format::Compact => registry
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init(),
            Format::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
        }
        .map_err(|_| LogError::AlreadyInstalled)?;

        Ok(LoggerGuard { _private: () })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_is_rejected() {
        let builder = LoggerBuilder::from_config(Config {
            level: "not a valid directive!!".to_string(),
            format: Format::Compact,
        });
        assert!(matches!(builder.build(), Err(LogError::Filter { .. })));
    }
}
