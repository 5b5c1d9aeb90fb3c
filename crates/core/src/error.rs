//! Shared error kinds used across the Steep workspace.

use thiserror::Error;

use crate::id::UuidParseError;

/// Errors raised by `steep-core` itself (mostly identifier parsing).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] UuidParseError),
}

/// Common `Result` alias for crates that only need `steep-core`'s errors.
pub type Result<T> = std::result::Result<T, CoreError>;
