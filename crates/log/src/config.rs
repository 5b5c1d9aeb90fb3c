use serde::{Deserialize, Serialize};

/// Output rendering for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable, ANSI-colored — the default for an interactive
    /// terminal.
    #[default]
    Pretty,
    /// One line per event, no color — used for log aggregation.
    Compact,
    /// Structured JSON, one object per line.
    Json,
}

/// Everything [`crate::LoggerBuilder`] needs (see `steep-config` for how
/// this is populated from `STEEP_LOG_*` environment overrides).
#[derive(Debug, Clone)]
pub struct Config {
    /// An `EnvFilter` directive string, e.g. `"info,steep_scheduler=debug"`.
    pub level: String,
    pub format: Format,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::default(),
        }
    }
}
