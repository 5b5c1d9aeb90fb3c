//! Bounded ring buffer of captured stdout lines (§4.4, `agent.outputLinesToCollect`).

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Node-local bound on collected output lines per executable.
pub const DEFAULT_CAPACITY: usize = 100;

/// Captured output lines, newest pushed at the back, oldest dropped once
/// `capacity` is exceeded.
///
/// The progress-estimation plugin receives a full copy of the buffer
/// (§4.4: "the full bounded ring copy to avoid concurrent mutation") so a
/// slow estimator never blocks the next line from being captured.
pub struct OutputRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl OutputRing {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.lines.lock().back().cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}
