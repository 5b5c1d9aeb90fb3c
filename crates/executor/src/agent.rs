//! `LocalAgent`: executes one process chain at a time (§4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use steep_core::{AgentId, ProcessChainId, ServiceId, VariableId};
use steep_eventbus::{addresses, EventBus, EventBusResult, Request};
use steep_model::{ArgumentType, Executable, ProcessChain, Value};
use steep_resilience::{RetryCounters, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ExecutorError, Result};
use crate::estimator::ProgressEstimator;
use crate::mkdir::{self, MkdirCache};
use crate::output::{self, OutputAdapterRegistry};
use crate::progress::ProgressPublisher;
use crate::ring::OutputRing;
use crate::runtime::{DockerRuntime, ExecutableRuntime, OtherRuntime, RuntimeRegistry};

/// Uniform retry policy applied to every executable.
///
/// [`steep_model::Executable::retries`] carries only a max-attempts count
/// (§4.4 step 4 is simplified at the model layer — see the steep-model
/// design note); the delay/backoff/kind-set shape is fixed here rather
/// than threaded through the chain, since nothing upstream produces a
/// per-executable value for it.
fn retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: max_attempts.max(1),
        delay: std::time::Duration::from_secs(1),
        exponential_backoff: true,
        retry_on: ["nonzero_exit".to_string(), "io".to_string()].into_iter().collect(),
    }
}

/// Executes process chains dispatched to this node, one at a time.
///
/// Registers itself at `agent.<id>` (§4.3, §6) and serves `allocate`,
/// `execute`, `cancel`, and `getProgress` requests.
pub struct LocalAgent {
    id: AgentId,
    bus: Arc<EventBus>,
    out_path: String,
    output_lines_to_collect: usize,
    /// §4.3: "marks itself busy with a lease that auto-expires after
    /// `busyTimeout` if no process chain arrives". Checked approximately
    /// (`running` non-empty) rather than tied to a specific allocation, since
    /// the agent only ever runs one chain at a time.
    busy_timeout: Duration,
    /// §4.3/§5: the lease also auto-expires `idleTimeout` after each
    /// completed chain, rather than releasing the instant the chain ends —
    /// this keeps a momentarily-idle agent from being handed a new chain
    /// before it's had a beat to do whatever post-chain bookkeeping it
    /// needs.
    idle_timeout: Duration,
    runtimes: RuntimeRegistry,
    docker: Arc<dyn ExecutableRuntime>,
    other: Arc<dyn ExecutableRuntime>,
    adapters: OutputAdapterRegistry,
    estimators: HashMap<ServiceId, Arc<dyn ProgressEstimator>>,
    mkdir_cache: MkdirCache,
    retry_counters: RetryCounters,
    progress: ProgressPublisher,
    busy: AtomicBool,
    running: DashMap<ProcessChainId, CancellationToken>,
}

impl LocalAgent {
    #[must_use]
    pub fn new(id: AgentId, bus: Arc<EventBus>, out_path: impl Into<String>, output_lines_to_collect: usize) -> Self {
        Self::with_busy_timeout(id, bus, out_path, output_lines_to_collect, Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_busy_timeout(
        id: AgentId,
        bus: Arc<EventBus>,
        out_path: impl Into<String>,
        output_lines_to_collect: usize,
        busy_timeout: Duration,
    ) -> Self {
        Self::with_timeouts(id, bus, out_path, output_lines_to_collect, busy_timeout, Duration::from_secs(5))
    }

    #[must_use]
    pub fn with_timeouts(
        id: AgentId,
        bus: Arc<EventBus>,
        out_path: impl Into<String>,
        output_lines_to_collect: usize,
        busy_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            id,
            bus,
            out_path: out_path.into(),
            output_lines_to_collect,
            busy_timeout,
            idle_timeout,
            runtimes: RuntimeRegistry::new(),
            docker: Arc::new(DockerRuntime),
            other: Arc::new(OtherRuntime),
            adapters: OutputAdapterRegistry::new(),
            estimators: HashMap::new(),
            mkdir_cache: MkdirCache::with_default_ttl(4096),
            retry_counters: RetryCounters::new(),
            progress: ProgressPublisher::new(),
            busy: AtomicBool::new(false),
            running: DashMap::new(),
        }
    }

    pub fn register_runtime(&mut self, name: impl Into<String>, runtime: Arc<dyn ExecutableRuntime>) {
        self.runtimes.register(name, runtime);
    }

    pub fn register_output_adapter(&mut self, data_type: impl Into<String>, adapter: Arc<dyn output::OutputAdapter>) {
        self.adapters.register(data_type, adapter);
    }

    pub fn register_estimator(&mut self, service: ServiceId, estimator: Arc<dyn ProgressEstimator>) {
        self.estimators.insert(service, estimator);
    }

    fn runtime_for(&self, runtime: &steep_model::Runtime) -> Result<Arc<dyn ExecutableRuntime>> {
        match runtime {
            steep_model::Runtime::Docker => Ok(Arc::clone(&self.docker)),
            steep_model::Runtime::Other => Ok(Arc::clone(&self.other)),
            steep_model::Runtime::Plugin(name) => self.runtimes.get(name).ok_or_else(|| {
                ExecutorError::ExecutionError {
                    message: format!("no runtime plugin registered for `{name}`"),
                    last_output: None,
                    exit_code: None,
                }
            }),
        }
    }

    /// Run `chain` to completion: mkdir batching, ordered executable run
    /// with retry, progress publication, then output materialization
    /// (§4.4 steps 1-6).
    pub async fn execute(
        &self,
        chain: &ProcessChain,
        cancel: &CancellationToken,
    ) -> Result<HashMap<VariableId, Value>> {
        self.precreate_output_dirs(chain, cancel).await?;

        let chain_length = chain.executables.len();
        for (index, executable) in chain.executables.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            let fractional = self.run_executable(chain, executable, cancel).await?;
            let value = crate::progress::fraction_complete(index, fractional, chain_length);
            self.progress.report(&self.bus, chain.id, value);
        }

        self.materialize_outputs(chain).await
    }

    async fn precreate_output_dirs(&self, chain: &ProcessChain, cancel: &CancellationToken) -> Result<()> {
        let mut dirs = Vec::new();
        for executable in &chain.executables {
            for output in executable.outputs() {
                let dir = mkdir::output_dir(&self.out_path, chain.submission_id, chain.id, output.variable);
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        for batch in mkdir::batch(self.mkdir_cache.filter_new(dirs)) {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Cancelled);
            }
            for dir in batch {
                tokio::fs::create_dir_all(&dir).await.map_err(|error| ExecutorError::ExecutionError {
                    message: format!("mkdir -p `{dir}`: {error}"),
                    last_output: None,
                    exit_code: None,
                })?;
            }
        }
        Ok(())
    }

    /// Run one executable under its retry policy; returns the estimated
    /// fractional completion within this executable for the progress
    /// calculation (1.0 when no estimator is registered for its service).
    async fn run_executable(
        &self,
        chain: &ProcessChain,
        executable: &Executable,
        cancel: &CancellationToken,
    ) -> Result<f64> {
        let args = render_args(chain, executable, &self.out_path);
        let runtime = self.runtime_for(&executable.runtime)?;
        let ring = OutputRing::new(self.output_lines_to_collect.max(1));
        let policy = retry_policy(executable.retries);

        let output = steep_resilience::retry(
            &policy,
            executable.service_id,
            &self.retry_counters,
            |error: &ExecutorError| error.retry_kind(),
            || runtime.run(&executable.path, &args, &ring, cancel),
        )
        .await?;

        if output.exit_code.is_some_and(|code| code != 0) {
            return Err(ExecutorError::ExecutionError {
                message: "exited with a non-zero status".to_string(),
                last_output: output.captured.last().cloned(),
                exit_code: output.exit_code,
            });
        }

        let fractional = self
            .estimators
            .get(&executable.service_id)
            .map_or(1.0, |estimator| estimator.estimate(&output.captured));
        Ok(fractional)
    }

    async fn materialize_outputs(&self, chain: &ProcessChain) -> Result<HashMap<VariableId, Value>> {
        let mut results = HashMap::new();
        for executable in &chain.executables {
            for output in executable.outputs() {
                let dir = mkdir::output_dir(&self.out_path, chain.submission_id, chain.id, output.variable);
                let values = output::resolve_output(&self.adapters, &output.data_type, &dir).await?;
                results.insert(output.variable, Value::List(values));
            }
        }
        Ok(results)
    }

    /// Serve `agent.<id>` requests until the bus address is deregistered
    /// or the process ends. One `execute` request runs at a time from
    /// this agent's point of view (`busy`); concurrent `cancel` and
    /// `getProgress` requests are still served promptly because each
    /// request is dispatched onto its own task.
    pub async fn serve(self: Arc<Self>) -> EventBusResult<()> {
        let address = addresses::agent(self.id);
        let mut requests = self.bus.register(&address, 64)?;
        info!(agent = %self.id, address, "local agent listening");

        while let Some(request) = requests.recv().await {
            let agent = Arc::clone(&self);
            tokio::spawn(async move { Self::handle_request(agent, request).await });
        }
        Ok(())
    }

    async fn handle_request(agent: Arc<Self>, request: Request) {
        let action = request.payload()["action"].as_str().unwrap_or("").to_string();
        match action.as_str() {
            "allocate" => {
                let allocated = agent.busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok();
                if allocated {
                    let watch = Arc::clone(&agent);
                    tokio::spawn(async move {
                        tokio::time::sleep(watch.busy_timeout).await;
                        if watch.running.is_empty() {
                            watch.busy.store(false, Ordering::SeqCst);
                        }
                    });
                }
                request.reply(json!({ "ok": allocated }));
            }
            "execute" => Self::handle_execute(agent, request).await,
            "cancel" => {
                if let Some(chain_id) = parse_chain_id(&request) {
                    if let Some(token) = agent.running.get(&chain_id) {
                        token.cancel();
                    }
                }
                request.reply(json!({ "ok": true }));
            }
            "getProgress" => {
                let progress = parse_chain_id(&request).and_then(|chain_id| agent.progress.get(chain_id));
                request.reply(json!({ "estimatedProgress": progress }));
            }
            other => {
                warn!(action = other, "unknown agent request action");
                request.reply(json!({ "error": format!("unknown action `{other}`") }));
            }
        }
    }

    async fn handle_execute(self: Arc<Self>, request: Request) {
        let chain: ProcessChain = match serde_json::from_value(request.payload()["chain"].clone()) {
            Ok(chain) => chain,
            Err(error) => {
                request.reply(json!({ "status": "ERROR", "errorMessage": error.to_string() }));
                return;
            }
        };

        let cancel = CancellationToken::new();
        self.running.insert(chain.id, cancel.clone());
        let result = self.execute(&chain, &cancel).await;
        self.running.remove(&chain.id);

        // §4.3/§5 idleTimeout: stay leased for a grace period after the
        // chain ends rather than clearing `busy` synchronously; a chain
        // dispatched to this agent in the meantime keeps the watch a no-op.
        let agent = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(agent.idle_timeout).await;
            if agent.running.is_empty() {
                agent.busy.store(false, Ordering::SeqCst);
            }
        });

        let payload = match result {
            Ok(results) => json!({ "status": "SUCCESS", "results": results_to_json(results) }),
            Err(ExecutorError::Cancelled) => json!({ "status": "CANCELLED" }),
            Err(ExecutorError::ExecutionError { message, last_output, exit_code }) => json!({
                "status": "ERROR",
                "errorMessage": message,
                "lastOutput": last_output,
                "exitCode": exit_code,
            }),
        };
        request.reply(payload);
    }
}

fn parse_chain_id(request: &Request) -> Option<ProcessChainId> {
    request.payload()["processChainId"].as_str()?.parse().ok()
}

fn results_to_json(results: HashMap<VariableId, Value>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = results
        .into_iter()
        .map(|(variable, value)| {
            let rendered = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            (variable.to_string(), rendered)
        })
        .collect();
    serde_json::Value::Object(map)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Scalar(s) | Value::Path(s) => s.clone(),
        Value::List(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
    }
}

fn render_args(chain: &ProcessChain, executable: &Executable, out_path: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(executable.args.len() * 2);
    for arg in &executable.args {
        if let Some(label) = &arg.label {
            args.push(label.clone());
        }
        let value = match arg.kind {
            ArgumentType::Input | ArgumentType::Argument => {
                chain.bindings.get(&arg.variable).map(render_value).unwrap_or_default()
            }
            ArgumentType::Output => mkdir::output_dir(out_path, chain.submission_id, chain.id, arg.variable),
        };
        args.push(value);
    }
    args
}
