use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage backend selector (§6 `db.driver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    Inmemory,
    Postgresql,
    Mongodb,
}

impl Default for DbDriver {
    fn default() -> Self {
        Self::Inmemory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub lookup_interval_milliseconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookup_interval_milliseconds: 20_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub lookup_interval_milliseconds: u64,
    pub lookup_orphans_interval_milliseconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lookup_interval_milliseconds: 2_000,
            lookup_orphans_interval_milliseconds: 5 * 60 * 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub enabled: bool,
    pub id: Option<String>,
    pub capabilities: Vec<String>,
    pub busy_timeout: u64,
    pub output_lines_to_collect: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id: None,
            capabilities: Vec::new(),
            busy_timeout: 30,
            output_lines_to_collect: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub driver: DbDriver,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Top-level configuration document (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SteepConfig {
    pub tmp_path: PathBuf,
    pub out_path: PathBuf,
    pub scheduler: SchedulerConfig,
    pub controller: ControllerConfig,
    pub agent: AgentConfig,
    pub db: DbConfig,
}

impl Default for SteepConfig {
    fn default() -> Self {
        Self {
            tmp_path: PathBuf::from("/tmp/steep"),
            out_path: PathBuf::from("/var/lib/steep/out"),
            scheduler: SchedulerConfig::default(),
            controller: ControllerConfig::default(),
            agent: AgentConfig::default(),
            db: DbConfig::default(),
        }
    }
}
