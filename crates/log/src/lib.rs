//! # Steep Log
//!
//! Process-wide `tracing` subscriber setup, shared by every Steep binary.

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Format};
pub use error::{LogError, LogResult};
