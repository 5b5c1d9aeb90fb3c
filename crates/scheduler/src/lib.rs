//! Capability-matched dispatch of REGISTERED process chains to agents (§4.5).

mod demand;
mod dispatch;
mod error;
mod scheduler;

pub use dispatch::dispatch;
pub use error::{Result, SchedulerError};
pub use scheduler::{Scheduler, SchedulerOptions};
