//! Progress estimation and publication (§4.4 step 5, §4.4 "Progress
//! estimation plugin").

use dashmap::DashMap;
use steep_core::ProcessChainId;
use steep_eventbus::{addresses, EventBus};

/// `(index + fractional) / chain_length`, rounded to two decimals
/// (§4.4 step 5).
#[must_use]
pub fn fraction_complete(index: usize, fractional: f64, chain_length: usize) -> f64 {
    if chain_length == 0 {
        return 1.0;
    }
    let raw = (index as f64 + fractional.clamp(0.0, 1.0)) / chain_length as f64;
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Publishes `processchain.progress` only when the rounded value actually
/// changes for a given chain, so a fast-completing executable doesn't
/// spam the bus with repeats of the same percentage.
pub struct ProgressPublisher {
    last: DashMap<ProcessChainId, f64>,
}

impl ProgressPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self { last: DashMap::new() }
    }

    #[must_use]
    pub fn get(&self, chain_id: ProcessChainId) -> Option<f64> {
        self.last.get(&chain_id).map(|entry| *entry)
    }

    pub fn report(&self, bus: &EventBus, chain_id: ProcessChainId, progress: f64) {
        let changed = match self.last.get(&chain_id) {
            Some(previous) => (*previous - progress).abs() > f64::EPSILON,
            None => true,
        };
        if !changed {
            return;
        }
        self.last.insert(chain_id, progress);
        bus.publish(
            addresses::PROCESS_CHAIN_PROGRESS,
            serde_json::json!({
                "processChainId": chain_id.to_string(),
                "estimatedProgress": progress,
            }),
        );
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}
