//! §4.5 step 3: dispatch one claimed chain to its allocated agent and
//! persist the outcome from its reply.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use steep_agent_registry::RemoteAgentRegistry;
use steep_core::{AgentId, VariableId};
use steep_eventbus::addresses;
use steep_model::{ProcessChain, ProcessChainStatus, Value};
use steep_registry::SubmissionRegistry;
use tracing::{info, warn};

use crate::error::Result;

/// Send `chain` (already claimed RUNNING with `owner`/`startTime` recorded
/// by the caller) to `agent_id`'s `execute` address, then write SUCCESS +
/// results or ERROR + errorMessage, setting `endTime` either way (§4.5
/// step 3). Always releases the agent's advisory busy bookkeeping.
pub async fn dispatch(
    registry: &dyn SubmissionRegistry,
    agents: &RemoteAgentRegistry,
    chain: ProcessChain,
    agent_id: AgentId,
    request_timeout: Duration,
) -> Result<()> {
    let reply = agents
        .bus()
        .request(
            &addresses::agent(agent_id),
            json!({ "action": "execute", "chain": chain }),
            request_timeout,
        )
        .await;

    let reply = match reply {
        Ok(reply) => reply,
        Err(error) => {
            // §7 Cluster: a dead agent is reclaimed by the controller's
            // orphan scan, not by the scheduler retrying the request.
            warn!(chain = %chain.id, agent = %agent_id, %error, "dispatch request failed, relying on orphan recovery");
            agents.release(agent_id);
            return Ok(());
        }
    };

    // CAS from RUNNING: an orphan scan that reclaimed this chain while the
    // request was in flight wins the race, and this late reply is dropped
    // rather than clobbering the chain back to a terminal status.
    let claimed = match reply["status"].as_str().unwrap_or("") {
        "SUCCESS" => {
            registry.set_results(chain.id, parse_results(&reply["results"])).await?;
            registry
                .set_status_cas(chain.id, ProcessChainStatus::Running, ProcessChainStatus::Success)
                .await?
        }
        "CANCELLED" => {
            registry
                .set_status_cas(chain.id, ProcessChainStatus::Running, ProcessChainStatus::Cancelled)
                .await?
        }
        _ => {
            registry.set_error_message(chain.id, error_message(&reply)).await?;
            registry
                .set_status_cas(chain.id, ProcessChainStatus::Running, ProcessChainStatus::Error)
                .await?
        }
    };
    if claimed {
        registry.set_end_time(chain.id, chrono::Utc::now()).await?;
    } else {
        warn!(chain = %chain.id, agent = %agent_id, "chain was reclaimed before its reply arrived, discarding result");
    }
    agents.release(agent_id);
    info!(chain = %chain.id, agent = %agent_id, "chain dispatch complete");
    Ok(())
}

/// §7: `"<msg>\n\nExit code: <n>\n\n<lastOutput>"`, degrading gracefully
/// when `exitCode`/`lastOutput` are absent from the reply.
fn error_message(reply: &serde_json::Value) -> String {
    let message = reply["errorMessage"].as_str().unwrap_or("execution failed");
    let exit_code = reply["exitCode"].as_i64();
    let last_output = reply["lastOutput"].as_str();
    match (exit_code, last_output) {
        (Some(code), Some(output)) => format!("{message}\n\nExit code: {code}\n\n{output}"),
        (Some(code), None) => format!("{message}\n\nExit code: {code}"),
        (None, Some(output)) => format!("{message}\n\n{output}"),
        (None, None) => message.to_string(),
    }
}

fn parse_results(value: &serde_json::Value) -> HashMap<VariableId, Vec<Value>> {
    let mut results = HashMap::new();
    let Some(map) = value.as_object() else {
        return results;
    };
    for (key, entry) in map {
        let Ok(variable) = key.parse::<VariableId>() else {
            continue;
        };
        let values = match serde_json::from_value::<Value>(entry.clone()) {
            Ok(Value::List(items)) => items,
            Ok(other) => vec![other],
            Err(_) => Vec::new(),
        };
        results.insert(variable, values);
    }
    results
}
