//! # Steep Executor
//!
//! `LocalAgent`: runs one process chain's ordered executables, with mkdir
//! batching, retry, progress publication, cooperative cancellation, and
//! output materialization (§4.4).

mod agent;
mod error;
mod estimator;
mod mkdir;
mod output;
mod progress;
mod ring;
mod runtime;

pub use agent::LocalAgent;
pub use error::{ExecutorError, Result};
pub use estimator::ProgressEstimator;
pub use mkdir::{output_dir, MkdirCache};
pub use output::{enumerate_filesystem, resolve_output, OutputAdapter, OutputAdapterRegistry};
pub use progress::{fraction_complete, ProgressPublisher};
pub use ring::OutputRing;
pub use runtime::{DockerRuntime, ExecutableRuntime, OtherRuntime, RunOutput, RuntimeRegistry};
