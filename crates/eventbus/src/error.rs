use thiserror::Error;

/// Failure modes of a bus `send`/`publish`/`request` (§4.3 "Request/reply
/// uses timeouts; a timed-out tryAllocate returns 'no agent'").
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("no handler registered at address {0:?}")]
    NoHandler(String),
    #[error("a handler is already registered at address {0:?}")]
    AlreadyRegistered(String),
    #[error("request to {0:?} timed out")]
    Timeout(String),
    #[error("handler at {0:?} dropped the reply channel without answering")]
    HandlerDropped(String),
}

pub type EventBusResult<T> = Result<T, EventBusError>;
