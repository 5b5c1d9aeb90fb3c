//! # Steep Event Bus
//!
//! The cluster-wide publish/subscribe and request/reply layer every other
//! component communicates over (§4.3, §5, §6).

pub mod addresses;
mod bus;
mod error;

pub use bus::{EventBus, Request};
pub use error::{EventBusError, EventBusResult};
