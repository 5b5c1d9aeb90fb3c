//! Runtimes invoke one [`steep_model::Executable`]'s command line (§4.4).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{ExecutorError, Result};
use crate::ring::OutputRing;

/// Everything a runtime produced from one executable run.
pub struct RunOutput {
    pub exit_code: Option<i32>,
    /// Contents of [`OutputRing`] at the time the process ended, for the
    /// progress-estimation plugin and for error reporting.
    pub captured: Vec<String>,
}

/// Port trait a runtime implements to invoke an executable's command line.
///
/// The engine calls this instead of spawning a process directly, so
/// plugin-provided runtimes (`Runtime::Plugin`) slot in next to the two
/// built-ins without the rest of the executor knowing the difference.
#[async_trait]
pub trait ExecutableRuntime: Send + Sync {
    async fn run(
        &self,
        path: &str,
        args: &[String],
        ring: &OutputRing,
        cancel: &CancellationToken,
    ) -> Result<RunOutput>;
}

/// Runs `path` as a native child process, streaming stdout lines into the
/// bounded ring buffer as they arrive (§4.4: "captured output line").
///
/// This is the one runtime actually exercised end-to-end by tests; it is
/// the `other` variant of [`steep_model::Runtime`].
pub struct OtherRuntime;

#[async_trait]
impl ExecutableRuntime for OtherRuntime {
    async fn run(
        &self,
        path: &str,
        args: &[String],
        ring: &OutputRing,
        cancel: &CancellationToken,
    ) -> Result<RunOutput> {
        let mut child = Command::new(path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| ExecutorError::ExecutionError {
                message: format!("failed to spawn `{path}`: {error}"),
                last_output: None,
                exit_code: None,
            })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(ExecutorError::Cancelled);
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => ring.push(line),
                        Ok(None) => break,
                        Err(error) => {
                            return Err(ExecutorError::ExecutionError {
                                message: format!("reading output of `{path}`: {error}"),
                                last_output: ring.last(),
                                exit_code: None,
                            });
                        }
                    }
                }
            }
        }

        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(ExecutorError::Cancelled);
            }
            status = child.wait() => status.map_err(|error| ExecutorError::ExecutionError {
                message: format!("waiting on `{path}`: {error}"),
                last_output: ring.last(),
                exit_code: None,
            })?,
        };

        Ok(RunOutput {
            exit_code: status.code(),
            captured: ring.snapshot(),
        })
    }
}

/// Stub for the `docker` runtime variant.
///
/// Real container invocation is a Non-goal (out-of-cluster runtime
/// integration); this documents the integration point a container-backed
/// implementation would fill — image resolution, volume mounts for
/// shared storage paths, and the same stdout-streaming contract as
/// [`OtherRuntime`].
pub struct DockerRuntime;

#[async_trait]
impl ExecutableRuntime for DockerRuntime {
    async fn run(
        &self,
        path: &str,
        _args: &[String],
        _ring: &OutputRing,
        _cancel: &CancellationToken,
    ) -> Result<RunOutput> {
        Err(ExecutorError::ExecutionError {
            message: format!("docker runtime not wired to a container engine (`{path}`)"),
            last_output: None,
            exit_code: None,
        })
    }
}

/// Lookup table for `Runtime::Plugin(name)` executables.
#[derive(Default)]
pub struct RuntimeRegistry {
    plugins: HashMap<String, Arc<dyn ExecutableRuntime>>,
}

impl RuntimeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, runtime: Arc<dyn ExecutableRuntime>) {
        self.plugins.insert(name.into(), runtime);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExecutableRuntime>> {
        self.plugins.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn other_runtime_captures_stdout_and_exit_code() {
        let ring = OutputRing::new(10);
        let cancel = CancellationToken::new();
        let output = OtherRuntime
            .run("/bin/echo", &["hello".to_string()], &ring, &cancel)
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.captured, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn other_runtime_reports_nonzero_exit() {
        let ring = OutputRing::new(10);
        let cancel = CancellationToken::new();
        let output = OtherRuntime
            .run("/bin/false", &[], &ring, &cancel)
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(1));
    }

    #[tokio::test]
    async fn cancellation_stops_a_running_process() {
        let ring = OutputRing::new(10);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel2.cancel();
        });
        let result = OtherRuntime.run("/bin/sleep", &["5".to_string()], &ring, &cancel).await;
        assert!(matches!(result, Err(ExecutorError::Cancelled)));
    }

    #[tokio::test]
    async fn docker_runtime_is_a_documented_stub() {
        let ring = OutputRing::new(10);
        let cancel = CancellationToken::new();
        let result = DockerRuntime.run("image:tag", &[], &ring, &cancel).await;
        assert!(result.is_err());
    }
}
